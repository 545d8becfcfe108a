// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_all);
}

/// Descriptions land in whichever recorder is installed at call time.
fn describe_all() {
    describe_counter!("poll_cycles_total", "Poll cycles started.");
    describe_counter!(
        "poll_fetch_attempts_total",
        "Upstream fetch attempts, retries included."
    );
    describe_counter!("poll_fetch_errors_total", "Failed upstream fetch attempts.");
    describe_counter!(
        "poll_shape_errors_total",
        "Upstream responses with an unrecognized payload shape."
    );
    describe_counter!("poll_new_items_total", "New posts detected.");
    describe_counter!(
        "poll_notify_errors_total",
        "New-post notifications that no sink delivered."
    );
    describe_gauge!(
        "poll_consecutive_failures",
        "Consecutive failed identity polls since the last healthy cycle."
    );
    describe_histogram!("poll_fetch_ms", "Upstream fetch attempt latency in milliseconds.");
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Only one may exist per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        // the once-guard may already have fired against the no-op recorder
        describe_all();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
