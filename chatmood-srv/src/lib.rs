//! chatmood-srv library interface
//!
//! Exposes the router and pipeline wiring for integration testing

pub mod api;
pub mod classifier;
pub mod error;
pub mod pipeline;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chatmood_common::analysis::ScoreSynthesizer;
use chatmood_common::config::ServerSettings;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::{AnalysisPool, BatchWriter, IngestQueue, IntakeHandle, Pipeline, WriterStats};
use crate::session::ActiveDataset;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<IngestQueue>,
    pub dataset: ActiveDataset,
    pub intake: IntakeHandle,
    pub writer_stats: Arc<WriterStats>,
    /// Whether a classifier backend answered at startup
    pub models_loaded: bool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Server-side copy of the active stream pointer, if configured
    pub pointer_file: Option<PathBuf>,
}

/// Wire up the queue, analysis pool and batch writer and start their tasks
///
/// Must be called inside a tokio runtime.
pub fn start(settings: &ServerSettings, synth: ScoreSynthesizer) -> (AppState, Pipeline) {
    let queue = Arc::new(IngestQueue::new(settings.max_queue_size));
    let dataset = ActiveDataset::new(&settings.data_dir, settings.default_dataset_path());
    let models_loaded = synth.models_loaded();

    let (intake, pool) = AnalysisPool::new(
        synth,
        Arc::clone(&queue),
        settings.analysis_workers,
        settings.intake_backlog,
    );
    let writer = BatchWriter::new(
        Arc::clone(&queue),
        dataset.clone(),
        Duration::from_secs_f64(settings.batch_save_seconds),
    );
    let writer_stats = writer.stats();
    let pipeline = Pipeline::spawn(pool, writer);

    let state = AppState {
        queue,
        dataset,
        intake,
        writer_stats,
        models_loaded,
        startup_time: Utc::now(),
        pointer_file: settings.pointer_file.clone(),
    };
    (state, pipeline)
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::chat_routes())
        .merge(api::stream_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
