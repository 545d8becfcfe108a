// src/error.rs
//! Error taxonomy shared by the fetch, checkpoint and scheduler layers.

use std::path::PathBuf;
use std::time::Duration;

/// Failure of a single upstream fetch, after classification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    /// No response at all (connect/read failure, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// Upstream answered with a 5xx.
    #[error("upstream server error (HTTP {status})")]
    ServerError { status: u16 },

    /// Upstream answered 429; `retry_after` is the server-supplied wait, if any.
    #[error("rate limited by upstream (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// 4xx other than 429. Never retried.
    #[error("upstream rejected request (HTTP {status})")]
    ClientRejection { status: u16 },

    /// 2xx with an envelope reporting `success: false`.
    #[error("upstream reported failure: {message}")]
    Api { message: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::ClientRejection { .. })
    }
}

/// Transport-level failure: the request never produced a response.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        FetchError::Network(e.0)
    }
}

/// Checkpoint persistence failure. Surfaced to the scheduler, never swallowed.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("writing checkpoint document {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing checkpoint document")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is already stopped and cannot be restarted")]
    AlreadyStopped,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TARGET_UIDS (or TARGET_UID for a single user) is required")]
    MissingTargets,

    #[error("at least one target UID must be provided")]
    EmptyTargets,
}
