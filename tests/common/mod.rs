// tests/common/mod.rs
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use square_monitor::error::TransportError;
use square_monitor::fetch::backoff::RetryPolicy;
use square_monitor::{
    CheckpointStore, FetchClient, NotificationMessage, Notifier, PollScheduler, RawResponse,
    SchedulerSettings, Transport,
};

pub type Reply = Result<RawResponse, TransportError>;

/// Per-identity scripted replies. The last reply of a script repeats forever.
/// A gated identity parks inside `fetch` until its gate is notified.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub calls: Mutex<Vec<(String, tokio::time::Instant)>>,
    /// Notified on every fetch, before any gate is awaited.
    pub entered: Notify,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, identity: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .insert(identity.to_string(), replies.into_iter().collect());
    }

    pub fn gate(&self, identity: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(identity.to_string(), gate.clone());
        gate
    }

    pub fn calls_for(&self, identity: &str) -> usize {
        self.calls.lock().iter().filter(|(id, _)| id == identity).count()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, identity: &str, _timeout: Duration) -> Result<RawResponse, TransportError> {
        self.calls
            .lock()
            .push((identity.to_string(), tokio::time::Instant::now()));
        self.entered.notify_one();
        let gate = self.gates.lock().get(identity).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut scripts = self.scripts.lock();
        let Some(queue) = scripts.get_mut(identity) else {
            return Err(TransportError(format!("no script for {identity}")));
        };
        if queue.len() > 1 {
            queue.pop_front().expect("non-empty queue")
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TransportError("empty script".into())))
        }
    }
}

/// Records every message; can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<NotificationMessage>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.title.clone()).collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.title.contains(needle))
            .count()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, msg: &NotificationMessage) -> Result<()> {
        self.sent.lock().push(msg.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("sink down"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// New-shape feed body with `(id, createTime)` items.
pub fn feed(items: &[(&str, i64)]) -> RawResponse {
    let contents: Vec<serde_json::Value> = items
        .iter()
        .map(|(id, ts)| {
            serde_json::json!({
                "id": id,
                "title": format!("post {id}"),
                "bodyTextOnly": "body",
                "createTime": ts,
                "updateTime": ts,
                "displayName": "Trader Joe",
            })
        })
        .collect();
    RawResponse::ok(
        serde_json::json!({
            "code": "000000",
            "message": null,
            "success": true,
            "data": { "contents": contents }
        })
        .to_string(),
    )
}

pub fn server_error() -> Reply {
    Ok(RawResponse::status(503))
}

pub fn policy(max_retries: u32, initial_ms: u64, max_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_backoff: Duration::from_millis(initial_ms),
        max_backoff: Duration::from_millis(max_ms),
    }
}

pub fn settings(ids: &[&str], interval_ms: u64, max_backoff_ms: u64, max_errors: u32) -> SchedulerSettings {
    SchedulerSettings {
        identities: ids.iter().map(|s| s.to_string()).collect(),
        polling_interval: Duration::from_millis(interval_ms),
        max_backoff: Duration::from_millis(max_backoff_ms),
        max_consecutive_errors: max_errors,
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub scheduler: Arc<PollScheduler>,
}

/// Scheduler over scripted transport, no fetch retries.
pub async fn harness(state_path: &Path, settings: SchedulerSettings) -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let store = CheckpointStore::load(state_path.to_path_buf()).await;
    let fetcher = FetchClient::new(transport.clone(), policy(0, 1, 1))
        .with_base_url("https://square.test");
    let scheduler = PollScheduler::new(settings, fetcher, notifier.clone(), store);
    Harness {
        transport,
        notifier,
        scheduler,
    }
}
