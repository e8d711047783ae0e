//! Ingestion pipeline: analysis pool → ingestion queue → batch writer

pub mod intake;
pub mod queue;
pub mod writer;

pub use intake::{AnalysisPool, IntakeHandle, IntakeSnapshot};
pub use queue::{IngestQueue, QueueStats};
pub use writer::{BatchWriter, FlushOutcome, WriterSnapshot, WriterStats};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use intake::IntakeStats;

/// How long shutdown waits for the analysis backlog to drain
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Background tasks owned by the server process
///
/// Teardown order matters: the analysis pool stops first so its backlog
/// reaches the queue, then the writer runs its final flush.
pub struct Pipeline {
    intake_shutdown: CancellationToken,
    writer_shutdown: CancellationToken,
    intake_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    intake_stats: Arc<IntakeStats>,
}

impl Pipeline {
    pub fn spawn(pool: AnalysisPool, writer: BatchWriter) -> Self {
        let intake_shutdown = CancellationToken::new();
        let writer_shutdown = CancellationToken::new();
        let intake_stats = pool.stats();
        let intake_task = pool.spawn(intake_shutdown.clone());
        let writer_task = writer.spawn(writer_shutdown.clone());
        Self {
            intake_shutdown,
            writer_shutdown,
            intake_task,
            writer_task,
            intake_stats,
        }
    }

    pub async fn shutdown(self) {
        self.shutdown_within(DRAIN_TIMEOUT).await
    }

    /// Stop the pipeline, giving the analysis backlog `drain_timeout` to finish
    ///
    /// Messages still unfinished after that are counted as abandoned.
    pub async fn shutdown_within(mut self, drain_timeout: Duration) {
        info!("Server shutting down...");

        self.intake_shutdown.cancel();
        match tokio::time::timeout(drain_timeout, &mut self.intake_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Analysis pool task failed: {}", e);
                self.intake_stats.abandon_unfinished();
            }
            Err(_) => {
                self.intake_task.abort();
                let _ = (&mut self.intake_task).await;
                let abandoned = self.intake_stats.abandon_unfinished();
                warn!(
                    abandoned,
                    "Analysis backlog did not drain within {:?}", drain_timeout
                );
            }
        }

        self.writer_shutdown.cancel();
        if let Err(e) = self.writer_task.await {
            error!("Batch saver task failed: {}", e);
        }

        info!("Pipeline stopped");
    }
}
