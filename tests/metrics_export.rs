// tests/metrics_export.rs
// Installs the global recorder, so this file holds a single test.
mod common;

use common::{feed, harness, settings};
use square_monitor::metrics::Metrics;

#[tokio::test]
async fn descriptions_survive_recorder_installed_after_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    // same order as the binary: scheduler first, recorder second
    let h = harness(&dir.path().join("s.json"), settings(&["u1"], 60_000, 600_000, 5)).await;
    let m = Metrics::init().expect("install recorder");

    h.transport.script("u1", vec![Ok(feed(&[("p1", 10)]))]);
    h.scheduler.run_cycle().await;

    let text = m.render();
    assert!(
        text.contains("# HELP poll_cycles_total Poll cycles started."),
        "missing description in:\n{text}"
    );
    assert!(text.contains("# HELP poll_fetch_attempts_total"));
    assert!(text.contains("poll_cycles_total 1"));
}
