// src/fetch/types.rs
use std::time::Duration;

use crate::error::TransportError;

/// One upstream post, normalized from whichever payload shape it arrived in.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    pub id: String,
    /// Id used to build the canonical post link.
    pub secondary_id: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub author_name: Option<String>,
}

/// What the transport saw on the wire, before any classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `retry-after` header, if present and numeric.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }
}

/// Authenticated access to the upstream profile feed. One call, no retries.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, identity: &str, timeout: Duration) -> Result<RawResponse, TransportError>;
}
