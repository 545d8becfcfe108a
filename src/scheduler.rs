// src/scheduler.rs
//! Poll loop: one cycle walks every tracked identity in order
//! (fetch → detect → notify → checkpoint), then waits before the next.
//!
//! State machine: `Idle → Running → Stopped`. `Stopped` is terminal.

use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::MonitorConfig;
use crate::error::{CheckpointError, FetchError, SchedulerError};
use crate::fetch::backoff::cycle_delay;
use crate::fetch::FetchClient;
use crate::notify::{NotificationMessage, Notifier};
use crate::novelty::{is_new, select_candidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub identities: Vec<String>,
    pub polling_interval: Duration,
    pub max_backoff: Duration,
    pub max_consecutive_errors: u32,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self {
            identities: cfg.target_uids.clone(),
            polling_interval: cfg.polling_interval(),
            max_backoff: cfg.max_backoff(),
            max_consecutive_errors: cfg.max_consecutive_errors.max(1),
        }
    }
}

/// Outcome of one pass over all identities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub succeeded: usize,
    pub failed: usize,
    pub notified: usize,
}

/// Why `run_until` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The shutdown future resolved.
    Interrupted,
    /// Too many consecutive failures.
    Halted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: RunState,
    pub consecutive_failures: u32,
    pub identities: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum IdentityError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

pub struct PollScheduler {
    settings: SchedulerSettings,
    fetcher: FetchClient,
    notifier: Arc<dyn Notifier>,
    store: AsyncMutex<CheckpointStore>,
    state: watch::Sender<RunState>,
    consecutive_failures: AtomicU32,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new(
        settings: SchedulerSettings,
        fetcher: FetchClient,
        notifier: Arc<dyn Notifier>,
        store: CheckpointStore,
    ) -> Arc<Self> {
        crate::metrics::ensure_metrics_described();
        let (state, _) = watch::channel(RunState::Idle);
        Arc::new(Self {
            settings,
            fetcher,
            notifier,
            store: AsyncMutex::new(store),
            state,
            consecutive_failures: AtomicU32::new(0),
            task: Mutex::new(None),
        })
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state(),
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            identities: self.settings.identities.clone(),
        }
    }

    pub async fn checkpoints(&self) -> BTreeMap<String, Checkpoint> {
        self.store.lock().await.snapshot()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Idle → Running: announce, run the first cycle immediately, then keep
    /// polling in a background task. A second call while running is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let mut prev = RunState::Idle;
        self.state.send_if_modified(|s| {
            prev = *s;
            if *s == RunState::Idle {
                *s = RunState::Running;
                true
            } else {
                false
            }
        });
        match prev {
            RunState::Running => {
                tracing::warn!("poll service is already running");
                return Ok(());
            }
            RunState::Stopped => return Err(SchedulerError::AlreadyStopped),
            RunState::Idle => {}
        }

        self.consecutive_failures.store(0, Ordering::SeqCst);
        tracing::info!(
            polling_interval_ms = self.settings.polling_interval.as_millis() as u64,
            identities = self.settings.identities.len(),
            "starting poll service"
        );

        let hello = NotificationMessage::started(&self.settings.identities);
        if let Err(e) = self.notifier.send(&hello).await {
            tracing::error!(error = %e, "failed to send start notification");
        }

        if let Some(delay) = self.tick().await {
            let this = Arc::clone(self);
            let handle = tokio::spawn(async move { this.run_loop(delay).await });
            *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
        Ok(())
    }

    /// Running → Stopped. Cancels a pending inter-cycle wait; an in-flight
    /// fetch finishes first. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        let mut prev = RunState::Idle;
        self.state.send_if_modified(|s| {
            prev = *s;
            if *s == RunState::Running {
                *s = RunState::Stopped;
                true
            } else {
                false
            }
        });
        match prev {
            RunState::Running => tracing::info!("poll service stopped"),
            RunState::Idle => tracing::warn!("poll service is not running"),
            RunState::Stopped => tracing::debug!("poll service already stopped"),
        }
    }

    /// Wait for the background loop to finish (after `stop` or a terminal error).
    pub async fn join(&self) {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(h) = handle {
            if let Err(e) = h.await {
                tracing::error!(error = %e, "poll loop task failed");
            }
        }
    }

    /// `start`, then run until `shutdown` resolves or the scheduler halts.
    ///
    /// `shutdown` is watched from before the first cycle, so a signal that
    /// arrives while that cycle is still fetching stops the scheduler after
    /// the in-flight identity.
    pub async fn run_until<F>(self: &Arc<Self>, shutdown: F) -> Result<Exit, SchedulerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let interrupted = Arc::new(AtomicBool::new(false));
        let watcher = {
            let this = Arc::clone(self);
            let flag = Arc::clone(&interrupted);
            tokio::spawn(async move {
                shutdown.await;
                flag.store(true, Ordering::SeqCst);
                this.stop();
            })
        };

        if let Err(e) = self.start().await {
            watcher.abort();
            return Err(e);
        }
        // signal landed before start left Idle, where stop is a no-op
        if interrupted.load(Ordering::SeqCst) {
            self.stop();
        }

        let mut rx = self.state.subscribe();
        wait_stopped(&mut rx).await;
        watcher.abort();
        self.join().await;

        if interrupted.load(Ordering::SeqCst) {
            Ok(Exit::Interrupted)
        } else {
            Ok(Exit::Halted)
        }
    }

    async fn run_loop(self: Arc<Self>, mut delay: Duration) {
        let mut rx = self.state.subscribe();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_stopped(&mut rx) => break,
            }
            match self.tick().await {
                Some(next) => delay = next,
                None => break,
            }
        }
        tracing::debug!("poll loop exited");
    }

    /// One cycle plus failure accounting. Returns the delay before the next
    /// cycle, or `None` once the scheduler is no longer running.
    async fn tick(&self) -> Option<Duration> {
        if !self.is_running() {
            return None;
        }
        let report = self.run_cycle().await;
        if !self.is_running() {
            return None;
        }

        let prev = self.consecutive_failures.load(Ordering::SeqCst);
        let failures = if report.succeeded > 0 {
            0
        } else {
            prev.saturating_add(report.failed as u32)
        };
        self.consecutive_failures.store(failures, Ordering::SeqCst);
        gauge!("poll_consecutive_failures").set(failures as f64);

        if failures >= self.settings.max_consecutive_errors {
            tracing::error!(
                consecutive_errors = failures,
                "maximum consecutive errors reached, stopping poll service"
            );
            let alert = NotificationMessage::halted(failures);
            if let Err(e) = self.notifier.send(&alert).await {
                tracing::error!(error = %e, "failed to send error notification");
            }
            self.stop();
            return None;
        }

        let delay = cycle_delay(
            self.settings.polling_interval,
            failures,
            self.settings.max_backoff,
        );
        if failures > 0 {
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                consecutive_errors = failures,
                "next poll (error backoff applied)"
            );
        } else {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "next poll");
        }
        Some(delay)
    }

    /// One pass over all identities, in configured order. Identities are
    /// independent: a failure is counted and the pass moves on.
    pub async fn run_cycle(&self) -> CycleReport {
        counter!("poll_cycles_total").increment(1);
        let mut report = CycleReport::default();

        for identity in &self.settings.identities {
            if self.state() == RunState::Stopped {
                break;
            }
            match self.poll_identity(identity).await {
                Ok(notified) => {
                    report.succeeded += 1;
                    if notified {
                        report.notified += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(identity = %identity, error = %e, "error during poll cycle");
                }
            }
        }

        tracing::debug!(
            succeeded = report.succeeded,
            failed = report.failed,
            notified = report.notified,
            "poll cycle finished"
        );
        report
    }

    /// Returns whether a new-post notification was attempted.
    async fn poll_identity(&self, identity: &str) -> Result<bool, IdentityError> {
        let items = self.fetcher.fetch(identity).await?;

        let Some(candidate) = select_candidate(&items) else {
            tracing::info!(identity, "no posts found for user");
            self.store.lock().await.record_checked(identity).await?;
            return Ok(false);
        };

        {
            let mut store = self.store.lock().await;
            let checkpoint = store.get(identity);

            if checkpoint.last_seen_id.is_none() {
                tracing::info!(identity, post_id = %candidate.id, "recording baseline post");
                store
                    .record_seen(identity, &candidate.id, candidate.created_at_ms)
                    .await?;
                return Ok(false);
            }
            if !is_new(&checkpoint, candidate) {
                tracing::debug!(identity, post_id = %candidate.id, "no new post");
                store.record_checked(identity).await?;
                return Ok(false);
            }
        }

        tracing::info!(identity, post_id = %candidate.id, title = ?candidate.title, "new post detected");
        counter!("poll_new_items_total").increment(1);

        let link = self.fetcher.item_url(candidate);
        let msg = NotificationMessage::new_post(identity, candidate, link);
        if let Err(e) = self.notifier.send(&msg).await {
            counter!("poll_notify_errors_total").increment(1);
            tracing::error!(identity, error = %e, "failed to send new post notification");
        }

        self.store
            .lock()
            .await
            .record_seen(identity, &candidate.id, candidate.created_at_ms)
            .await?;
        Ok(true)
    }
}

async fn wait_stopped(rx: &mut watch::Receiver<RunState>) {
    loop {
        let stopped = *rx.borrow_and_update() == RunState::Stopped;
        if stopped || rx.changed().await.is_err() {
            return;
        }
    }
}
