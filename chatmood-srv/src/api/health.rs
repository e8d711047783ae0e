//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{IntakeSnapshot, QueueStats, WriterSnapshot};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when running without models
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub models_loaded: bool,
    /// Dataset the next flush appends to
    pub active_file: String,
    pub queue: QueueStats,
    pub intake: IntakeSnapshot,
    pub writer: WriterSnapshot,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let status = if state.models_loaded { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "chatmood-srv".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        models_loaded: state.models_loaded,
        active_file: state.dataset.current().await.to_string_lossy().to_string(),
        queue: state.queue.stats(),
        intake: state.intake.stats(),
        writer: state.writer_stats.snapshot(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
