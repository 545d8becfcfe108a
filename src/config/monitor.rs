// src/config/monitor.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::fetch::backoff::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://www.binance.com";

/// Below this the upstream tends to start answering 429.
const MIN_SAFE_INTERVAL_MS: u64 = 5_000;

fn default_polling_interval_ms() -> u64 {
    60_000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    60_000
}
fn default_max_consecutive_errors() -> u32 {
    5
}
fn default_state_file_path() -> PathBuf {
    PathBuf::from("./state.json")
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Optional request headers forwarded verbatim to the upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamHeaders {
    pub user_agent: Option<String>,
    pub cookies: Option<String>,
    pub csrf_token: Option<String>,
    pub device_info: Option<String>,
    pub fvideo_id: Option<String>,
    pub fvideo_token: Option<String>,
    pub bnc_uuid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Tracked identities, in polling order, duplicates removed.
    pub target_uids: Vec<String>,
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    #[serde(default = "default_state_file_path")]
    pub state_file_path: PathBuf,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bind address of the status server; `None` disables it.
    #[serde(default)]
    pub status_addr: Option<String>,
    #[serde(default)]
    pub headers: UpstreamHeaders,
}

impl MonitorConfig {
    /// Config with defaults for everything but the targets.
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_uids: dedup_targets(targets.into_iter().map(Into::into)),
            polling_interval_ms: default_polling_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_consecutive_errors: default_max_consecutive_errors(),
            state_file_path: default_state_file_path(),
            base_url: default_base_url(),
            status_addr: None,
            headers: UpstreamHeaders::default(),
        }
    }

    /// Load from the process environment (call `dotenvy::dotenv()` first if wanted).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| -> u64 {
            match get(key) {
                None => default,
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(key, value = %raw, default, "invalid number, using default");
                    default
                }),
            }
        };

        let raw_targets = get("TARGET_UIDS")
            .or_else(|| get("TARGET_UID"))
            .ok_or(ConfigError::MissingTargets)?;

        let cfg = Self {
            target_uids: dedup_targets(raw_targets.split(',').map(str::to_string)),
            polling_interval_ms: number("POLLING_INTERVAL_MS", default_polling_interval_ms()),
            request_timeout_ms: number("REQUEST_TIMEOUT_MS", default_request_timeout_ms()),
            max_retries: number("MAX_RETRIES", u64::from(default_max_retries()))
                .min(u64::from(u32::MAX)) as u32,
            initial_backoff_ms: number("INITIAL_BACKOFF_MS", default_initial_backoff_ms()),
            max_backoff_ms: number("MAX_BACKOFF_MS", default_max_backoff_ms()),
            max_consecutive_errors: number(
                "MAX_CONSECUTIVE_ERRORS",
                u64::from(default_max_consecutive_errors()),
            )
            .min(u64::from(u32::MAX)) as u32,
            state_file_path: get("STATE_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_state_file_path),
            base_url: get("BASE_URL").unwrap_or_else(default_base_url),
            status_addr: get("STATUS_ADDR"),
            headers: UpstreamHeaders {
                user_agent: get("USER_AGENT"),
                cookies: get("COOKIES"),
                csrf_token: get("CSRF_TOKEN"),
                device_info: get("DEVICE_INFO"),
                fvideo_id: get("FVIDEO_ID"),
                fvideo_token: get("FVIDEO_TOKEN"),
                bnc_uuid: get("BNC_UUID"),
            },
        };
        cfg.validated()
    }

    /// Load from a TOML file with the same field names as the struct.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        let mut cfg: MonitorConfig = toml::from_str(&data)
            .with_context(|| format!("parsing monitor config {}", path.display()))?;
        cfg.target_uids = dedup_targets(cfg.target_uids);
        cfg.validated()
    }

    fn validated(mut self) -> Result<Self> {
        if self.target_uids.is_empty() {
            return Err(ConfigError::EmptyTargets.into());
        }
        if self.max_consecutive_errors == 0 {
            tracing::warn!("MAX_CONSECUTIVE_ERRORS=0 is meaningless, using 1");
            self.max_consecutive_errors = 1;
        }
        if self.polling_interval_ms < MIN_SAFE_INTERVAL_MS {
            tracing::warn!(
                polling_interval_ms = self.polling_interval_ms,
                "polling interval is less than 5 seconds, this may trigger rate limiting"
            );
        }
        tracing::info!(
            targets = %self.target_uids.join(", "),
            target_count = self.target_uids.len(),
            polling_interval_ms = self.polling_interval_ms,
            max_retries = self.max_retries,
            "configuration loaded"
        );
        Ok(self)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: self.max_backoff(),
        }
    }
}

/// Trim, drop empties and duplicates; first occurrence keeps its position.
fn dedup_targets<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|s| s == t) {
            out.push(t.to_string());
        }
    }
    out
}
