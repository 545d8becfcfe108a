// src/api.rs
//! Read-only status server: liveness, scheduler state, checkpoints, metrics.

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::checkpoint::Checkpoint;
use crate::scheduler::{PollScheduler, SchedulerStatus};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PollScheduler>,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Serialize)]
struct StatusResp {
    #[serde(flatten)]
    scheduler: SchedulerStatus,
    checkpoints: BTreeMap<String, Checkpoint>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/metrics", get(metrics_text))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    Json(StatusResp {
        scheduler: state.scheduler.status(),
        checkpoints: state.scheduler.checkpoints().await,
    })
}

async fn metrics_text(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics {
        Some(h) => (StatusCode::OK, h.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Bind and serve until the process exits.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding status server on {addr}"))?;
    tracing::info!(addr, "status server listening");
    axum::serve(listener, create_router(state))
        .await
        .context("status server")?;
    Ok(())
}
