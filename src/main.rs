//! Binance Square monitor binary entrypoint.
//! Loads config, wires the scheduler and notification sinks, optionally
//! serves the status API, and stops cleanly on Ctrl-C / SIGTERM.

use std::sync::Arc;

use anyhow::Result;
use square_monitor::{
    api, build_scheduler, metrics::Metrics, Exit, MonitorConfig, NotifierMux,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("square_monitor=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down gracefully"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down gracefully"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    tracing::info!("=== Binance Square Monitor ===");
    let cfg = MonitorConfig::from_env()?;

    let notifier = Arc::new(NotifierMux::from_env());
    let scheduler = build_scheduler(&cfg, notifier).await?;

    if let Some(addr) = cfg.status_addr.clone() {
        let metrics = match Metrics::init() {
            Ok(m) => Some(m.handle),
            Err(e) => {
                tracing::warn!(error = %e, "metrics disabled");
                None
            }
        };
        let state = api::AppState {
            scheduler: Arc::clone(&scheduler),
            metrics,
        };
        tokio::spawn(async move {
            if let Err(e) = api::serve(&addr, state).await {
                tracing::error!(error = %e, "status server failed");
            }
        });
    }

    tracing::info!(
        targets = %cfg.target_uids.join(", "),
        polling_interval_ms = cfg.polling_interval_ms,
        "starting monitor, press Ctrl+C to stop"
    );

    // signals are handled from here on, including during the first cycle
    let exit = scheduler.run_until(shutdown_signal()).await?;

    if exit == Exit::Halted {
        anyhow::bail!(
            "monitor halted after {} consecutive errors",
            scheduler.status().consecutive_failures
        );
    }
    Ok(())
}
