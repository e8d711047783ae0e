//! Analysis pool
//!
//! Deferred classification work submitted by the intake endpoint. The HTTP
//! handler only hands the message to a bounded job channel and returns; a
//! dispatcher task runs up to `workers` classifications at once on the
//! blocking thread pool and enqueues the results in submission order.
//!
//! Ordering is held back for at most the reorder window: once the oldest
//! unfinished job has been running longer than that, results behind it are
//! released and the slow one is enqueued whenever it finishes.
//!
//! Overload handling:
//! - full job channel → job dropped at submission (counted as `rejected`)
//! - full ingestion queue → record dropped after classification (counted by the queue)
//! - jobs still unfinished when shutdown gives up → counted as `abandoned`

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatmood_common::analysis::ScoreSynthesizer;
use chatmood_common::{time, AnalysisRecord, ChatMessage};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::queue::IngestQueue;

/// How long the oldest unfinished job may hold back later results
pub const REORDER_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct IntakeStats {
    submitted: AtomicU64,
    rejected: AtomicU64,
    processed: AtomicU64,
    abandoned: AtomicU64,
}

/// Snapshot of intake counters for `/health`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IntakeSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub processed: u64,
    pub abandoned: u64,
}

impl IntakeStats {
    pub fn snapshot(&self) -> IntakeSnapshot {
        IntakeSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }

    /// Count every accepted job that never reached the queue as abandoned
    ///
    /// Only meaningful once the dispatcher task has stopped.
    pub fn abandon_unfinished(&self) -> u64 {
        let snapshot = self.snapshot();
        let unfinished = snapshot
            .submitted
            .saturating_sub(snapshot.processed + snapshot.abandoned);
        self.abandoned.fetch_add(unfinished, Ordering::Relaxed);
        unfinished
    }
}

/// Submission side, cloned into every request handler
#[derive(Clone)]
pub struct IntakeHandle {
    jobs: mpsc::Sender<ChatMessage>,
    stats: Arc<IntakeStats>,
}

impl IntakeHandle {
    /// Hand a message to the pool without waiting
    ///
    /// Returns `false` when the backlog is full or the pool has stopped; the
    /// message is dropped in both cases.
    pub fn submit(&self, message: ChatMessage) -> bool {
        match self.jobs.try_send(message) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(author = %message.author, "Analysis backlog is full! A message was dropped.");
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(author = %message.author, "Analysis pool stopped; message dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> IntakeSnapshot {
        self.stats.snapshot()
    }
}

/// A submitted job waiting for its turn to be enqueued
struct Slot {
    started: Instant,
    record: Option<AnalysisRecord>,
}

/// Dispatcher side
pub struct AnalysisPool {
    jobs: mpsc::Receiver<ChatMessage>,
    synth: ScoreSynthesizer,
    queue: Arc<IngestQueue>,
    workers: usize,
    reorder_window: Duration,
    stats: Arc<IntakeStats>,
}

impl AnalysisPool {
    pub fn new(
        synth: ScoreSynthesizer,
        queue: Arc<IngestQueue>,
        workers: usize,
        backlog: usize,
    ) -> (IntakeHandle, AnalysisPool) {
        let (tx, rx) = mpsc::channel(backlog.max(1));
        let stats = Arc::new(IntakeStats::default());
        let handle = IntakeHandle {
            jobs: tx,
            stats: Arc::clone(&stats),
        };
        let pool = AnalysisPool {
            jobs: rx,
            synth,
            queue,
            workers: workers.max(1),
            reorder_window: REORDER_WINDOW,
            stats,
        };
        (handle, pool)
    }

    pub fn with_reorder_window(mut self, window: Duration) -> Self {
        self.reorder_window = window;
        self
    }

    pub fn stats(&self) -> Arc<IntakeStats> {
        Arc::clone(&self.stats)
    }

    /// Process jobs until the channel is exhausted
    ///
    /// When `shutdown` fires the channel is closed to new submissions and
    /// the backlog already accepted is still classified and enqueued.
    pub async fn run(self, shutdown: CancellationToken) {
        let AnalysisPool {
            mut jobs,
            synth,
            queue,
            workers,
            reorder_window,
            stats,
        } = self;

        info!("Analysis pool started ({} workers)", workers);

        let mut in_flight: FuturesUnordered<BoxFuture<'static, (u64, AnalysisRecord)>> =
            FuturesUnordered::new();
        let mut pending: BTreeMap<u64, Slot> = BTreeMap::new();
        let mut next_seq: u64 = 0;
        let mut closing = false;
        let mut exhausted = false;

        while !(exhausted && in_flight.is_empty()) {
            let head_deadline = pending.values().next().map(|slot| slot.started + reorder_window);

            tokio::select! {
                biased;

                _ = shutdown.cancelled(), if !closing => {
                    closing = true;
                    jobs.close();
                    info!("Analysis pool draining backlog");
                }

                Some((seq, record)) = in_flight.next(), if !in_flight.is_empty() => {
                    match pending.get_mut(&seq) {
                        Some(slot) => slot.record = Some(record),
                        None => {
                            debug!(seq, "Late analysis result");
                            enqueue(&queue, &stats, record);
                        }
                    }
                }

                message = jobs.recv(), if !exhausted && in_flight.len() < workers => {
                    match message {
                        Some(message) => {
                            let seq = next_seq;
                            next_seq += 1;
                            pending.insert(seq, Slot { started: Instant::now(), record: None });
                            let synth = synth.clone();
                            in_flight.push(
                                analyze_offloaded(synth, message)
                                    .map(move |record| (seq, record))
                                    .boxed(),
                            );
                        }
                        None => exhausted = true,
                    }
                }

                _ = tokio::time::sleep_until(head_deadline.unwrap_or_else(Instant::now)), if head_deadline.is_some() => {
                    if let Some((seq, _)) = pending.pop_first() {
                        warn!(seq, "Analysis is slow; releasing later messages ahead of it");
                    }
                }
            }

            release_ready(&mut pending, &queue, &stats);
        }

        info!("Analysis pool stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Enqueue finished results from the front of the submission order
fn release_ready(pending: &mut BTreeMap<u64, Slot>, queue: &IngestQueue, stats: &IntakeStats) {
    while let Some(entry) = pending.first_entry() {
        if entry.get().record.is_none() {
            break;
        }
        if let Some(record) = entry.remove().record {
            enqueue(queue, stats, record);
        }
    }
}

fn enqueue(queue: &IngestQueue, stats: &IntakeStats, record: AnalysisRecord) {
    let author = record.author.clone().unwrap_or_default();
    if queue.enqueue(record) {
        debug!("Queued message from {}. Queue size: {}", author, queue.len());
    } else {
        warn!(author = %author, "Message queue is full! A message was dropped.");
    }
    stats.processed.fetch_add(1, Ordering::Relaxed);
}

/// Classify on the blocking pool, then stamp intake metadata
async fn analyze_offloaded(synth: ScoreSynthesizer, message: ChatMessage) -> AnalysisRecord {
    let text = message.raw_text.clone();
    let record = match tokio::task::spawn_blocking(move || synth.analyze(&text)).await {
        Ok(record) => record,
        Err(e) => {
            error!("Error during analysis task: {}", e);
            AnalysisRecord {
                error: Some(format!("Analysis task failed: {}", e)),
                ..Default::default()
            }
        }
    };
    let latency = time::now().signed_duration_since(message.received_at);
    debug!(
        author = %message.author,
        latency_ms = latency.num_milliseconds(),
        "Message analyzed"
    );
    record.stamped(&message, time::now_iso8601())
}
