// src/fetch/mod.rs
pub mod backoff;
pub mod http;
pub(crate) mod payload;
pub mod types;

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::monitor::DEFAULT_BASE_URL;
use crate::error::FetchError;
use backoff::RetryPolicy;
use payload::Envelope;
use types::{ContentItem, RawResponse, Transport};

/// Retrying front of a `Transport`. One `fetch` = one logical call upstream,
/// at most `max_retries + 1` attempts.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    request_timeout: Duration,
    base_url: String,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            request_timeout: Duration::from_secs(10),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Canonical public link for an item.
    pub fn item_url(&self, item: &ContentItem) -> String {
        format!("{}/en/square/post/{}", self.base_url, item.secondary_id)
    }

    pub async fn fetch(&self, identity: &str) -> Result<Vec<ContentItem>, FetchError> {
        let attempts = self.policy.attempts();
        let mut backoff = self.policy.backoff();
        let mut last_err = FetchError::Network("no attempt made".to_string());

        for attempt in 1..=attempts {
            tracing::debug!(identity, attempt, attempts, "fetching posts");
            counter!("poll_fetch_attempts_total").increment(1);

            let t0 = Instant::now();
            let outcome = self.attempt(identity).await;
            histogram!("poll_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

            let err = match outcome {
                Ok(items) => {
                    tracing::debug!(identity, count = items.len(), "fetched posts");
                    return Ok(items);
                }
                Err(e) => e,
            };
            counter!("poll_fetch_errors_total").increment(1);

            if !err.is_retryable() {
                tracing::error!(identity, attempt, error = %err, "client error, not retrying");
                return Err(err);
            }
            tracing::warn!(identity, attempt, error = %err, "fetch attempt failed");

            // Computed schedule advances on every failure; retry-after only
            // replaces the wait it applies to.
            let computed = backoff.next_delay();
            let wait = match &err {
                FetchError::RateLimited {
                    retry_after: Some(d),
                } => *d,
                _ => computed,
            };
            last_err = err;

            if attempt < attempts {
                tracing::info!(identity, delay_ms = wait.as_millis() as u64, "retrying");
                tokio::time::sleep(wait).await;
            }
        }

        tracing::error!(identity, error = %last_err, "all retry attempts exhausted");
        Err(last_err)
    }

    async fn attempt(&self, identity: &str) -> Result<Vec<ContentItem>, FetchError> {
        let raw = self.transport.fetch(identity, self.request_timeout).await?;
        classify(identity, raw)
    }
}

/// Map a raw response onto the error taxonomy, or into items.
fn classify(identity: &str, raw: RawResponse) -> Result<Vec<ContentItem>, FetchError> {
    match raw.status {
        429 => {
            return Err(FetchError::RateLimited {
                retry_after: raw.retry_after,
            })
        }
        s if (400..500).contains(&s) => return Err(FetchError::ClientRejection { status: s }),
        s if !(200..300).contains(&s) => return Err(FetchError::ServerError { status: s }),
        _ => {}
    }

    let envelope = match Envelope::parse(&raw.body) {
        Ok(env) => env,
        Err(e) => {
            // Malformed payloads are not worth retrying; treat as an empty feed.
            tracing::warn!(identity, error = %e, "unexpected upstream response shape");
            counter!("poll_shape_errors_total").increment(1);
            return Ok(Vec::new());
        }
    };

    if !envelope.success {
        let message = envelope
            .message
            .clone()
            .or_else(|| envelope.code.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(FetchError::Api { message });
    }

    Ok(envelope.into_items())
}
