// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod notify;
pub mod novelty;
pub mod scheduler;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::checkpoint::{Checkpoint, CheckpointStore};
pub use crate::config::MonitorConfig;
pub use crate::fetch::types::{ContentItem, RawResponse, Transport};
pub use crate::fetch::FetchClient;
pub use crate::notify::{NotificationMessage, Notifier, NotifierMux};
pub use crate::scheduler::{CycleReport, Exit, PollScheduler, RunState, SchedulerSettings};

use std::sync::Arc;

/// Wire a scheduler from config: load checkpoints, build the HTTP transport
/// and retrying client. The caller supplies the notification sink.
pub async fn build_scheduler(
    cfg: &MonitorConfig,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<Arc<PollScheduler>> {
    let store = CheckpointStore::load(cfg.state_file_path.clone()).await;
    let transport = fetch::http::HttpTransport::from_config(cfg)?;
    let fetcher = FetchClient::new(Arc::new(transport), cfg.retry_policy())
        .with_timeout(cfg.request_timeout())
        .with_base_url(cfg.base_url.clone());
    Ok(PollScheduler::new(
        SchedulerSettings::from_config(cfg),
        fetcher,
        notifier,
        store,
    ))
}
