//! chatmood-srv - live chat sentiment and toxicity server
//!
//! Accepts chat messages over HTTP, classifies them on a bounded worker pool
//! and appends the results to the active per-stream CSV dataset in batches.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatmood_common::analysis::ScoreSynthesizer;
use chatmood_common::config::{load_toml_config, ServerSection, ServerSettings};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatmood_srv::classifier::CommandClassifier;

/// Command-line arguments for chatmood-srv
#[derive(Parser, Debug)]
#[command(name = "chatmood-srv")]
#[command(about = "Live chat sentiment and toxicity analysis server")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "CHATMOOD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "CHATMOOD_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CHATMOOD_PORT")]
    port: Option<u16>,

    /// Directory holding the CSV datasets
    #[arg(short, long, env = "CHATMOOD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Seconds between batch saves
    #[arg(long, env = "CHATMOOD_BATCH_SAVE_SECONDS")]
    batch_save_seconds: Option<f64>,

    /// Ingestion queue capacity
    #[arg(long, env = "CHATMOOD_MAX_QUEUE_SIZE")]
    max_queue_size: Option<usize>,

    /// Concurrent classifications
    #[arg(long, env = "CHATMOOD_ANALYSIS_WORKERS")]
    analysis_workers: Option<usize>,

    /// Messages waiting for a worker before new ones are dropped
    #[arg(long, env = "CHATMOOD_INTAKE_BACKLOG")]
    intake_backlog: Option<usize>,

    /// Inference command (normalized text on stdin, JSON on stdout)
    #[arg(long, env = "CHATMOOD_CLASSIFIER_COMMAND")]
    classifier_command: Option<String>,

    /// Also write the active dataset path here on every set_stream
    #[arg(long, env = "CHATMOOD_POINTER_FILE")]
    pointer_file: Option<PathBuf>,
}

impl Args {
    fn section(&self) -> ServerSection {
        ServerSection {
            host: self.host.clone(),
            port: self.port,
            data_dir: self.data_dir.clone(),
            batch_save_seconds: self.batch_save_seconds,
            max_queue_size: self.max_queue_size,
            analysis_workers: self.analysis_workers,
            intake_backlog: self.intake_backlog,
            classifier_command: self.classifier_command.clone(),
            pointer_file: self.pointer_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatmood_srv=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "chatmood-srv v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    // CLI/env > TOML > compiled defaults
    let toml = load_toml_config(args.config.as_deref()).context("Failed to load config")?;
    let settings = ServerSettings::from_section(args.section().or(toml.server))
        .context("Invalid server configuration")?;
    info!("Data directory: {}", settings.data_dir.display());

    let synth = load_models(settings.classifier_command.clone()).await;

    let (state, pipeline) = chatmood_srv::start(&settings, synth);
    let app = chatmood_srv::build_router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    // Flush whatever made it into the queue even if serving failed
    pipeline.shutdown().await;
    served?;

    info!("Server shutdown complete");
    Ok(())
}

/// Probe the configured classifier; without one the server runs unloaded
async fn load_models(command: Option<String>) -> ScoreSynthesizer {
    let Some(command) = command else {
        warn!("No classifier command configured; every message will be recorded as 'Models are not loaded.'");
        return ScoreSynthesizer::unloaded();
    };

    info!("Loading models via: {}", command);
    let probed = tokio::task::spawn_blocking(move || {
        let classifier = CommandClassifier::from_command_line(&command)?;
        classifier.probe()?;
        Ok::<_, chatmood_common::analysis::ClassifierError>(classifier)
    })
    .await;

    match probed {
        Ok(Ok(classifier)) => {
            info!("Models loaded successfully");
            ScoreSynthesizer::new(Arc::new(classifier))
        }
        Ok(Err(e)) => {
            error!("Error loading models: {}", e);
            ScoreSynthesizer::unloaded()
        }
        Err(e) => {
            error!("Model probe task failed: {}", e);
            ScoreSynthesizer::unloaded()
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
