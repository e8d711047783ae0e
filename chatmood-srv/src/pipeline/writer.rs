//! Batch persistence task
//!
//! Drains the ingestion queue every `batch_save_seconds` and appends the batch
//! to the active dataset CSV as one contiguous block. On shutdown it performs
//! one final flush before terminating.
//!
//! A write failure drops the batch: it is logged and counted, never re-queued.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatmood_common::AnalysisRecord;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::queue::IngestQueue;
use crate::session::ActiveDataset;

/// Dataset column order; every row has exactly these cells
pub const COLUMNS: [&str; 9] = [
    "timestamp",
    "author",
    "original_message",
    "cleaned_message",
    "sentiment_label",
    "sentiment_score",
    "toxicity_label",
    "toxicity_score",
    "error",
];

#[derive(Debug, Default)]
pub struct WriterStats {
    flushes: AtomicU64,
    rows_written: AtomicU64,
    batches_dropped: AtomicU64,
    rows_dropped: AtomicU64,
}

/// Snapshot of writer counters for `/health`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WriterSnapshot {
    pub flushes: u64,
    pub rows_written: u64,
    pub batches_dropped: u64,
    pub rows_dropped: u64,
}

impl WriterStats {
    pub fn snapshot(&self) -> WriterSnapshot {
        WriterSnapshot {
            flushes: self.flushes.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Result of one flush
#[derive(Debug)]
pub enum FlushOutcome {
    /// Queue was empty; nothing touched on disk
    Empty,
    Written { path: PathBuf, rows: usize },
    Dropped { path: PathBuf, rows: usize, error: String },
}

pub struct BatchWriter {
    queue: Arc<IngestQueue>,
    dataset: ActiveDataset,
    period: Duration,
    stats: Arc<WriterStats>,
}

impl BatchWriter {
    pub fn new(queue: Arc<IngestQueue>, dataset: ActiveDataset, period: Duration) -> Self {
        Self {
            queue,
            dataset,
            period,
            stats: Arc::new(WriterStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<WriterStats> {
        Arc::clone(&self.stats)
    }

    /// Drain the queue and append whatever was there
    pub async fn flush(&self) -> FlushOutcome {
        let batch = self.queue.drain_all();
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        // Read at flush time: set_stream may have switched files since the last tick
        let path = self.dataset.current().await;
        let rows = batch.len();

        match append_batch(&path, &batch).await {
            Ok(()) => {
                self.stats.flushes.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .rows_written
                    .fetch_add(rows as u64, Ordering::Relaxed);
                info!("Saved {} messages to {}", rows, path.display());
                FlushOutcome::Written { path, rows }
            }
            Err(e) => {
                self.stats.batches_dropped.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .rows_dropped
                    .fetch_add(rows as u64, Ordering::Relaxed);
                error!(
                    rows,
                    path = %path.display(),
                    "Error saving batch to CSV, batch dropped: {}",
                    e
                );
                FlushOutcome::Dropped {
                    path,
                    rows,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Periodic flush loop; returns after the final flush once `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Batch saver task started (interval: {:.1}s)",
            self.period.as_secs_f64()
        );

        let mut timer = interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {
                    if let FlushOutcome::Empty = self.flush().await {
                        debug!("Batch saver: queue empty");
                    }
                }
            }
        }

        if !self.queue.is_empty() {
            info!("Saving remaining messages in queue...");
        }
        self.flush().await;
        info!("Batch saver task stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Append one block of rows, writing the header only for a new file
pub async fn append_batch(path: &Path, batch: &[AnalysisRecord]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file_exists = tokio::fs::metadata(path).await.is_ok();

    let mut block = String::new();
    if !file_exists {
        block.push_str(&COLUMNS.join(","));
        block.push('\n');
    }
    for record in batch {
        block.push_str(&encode_row(record));
        block.push('\n');
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(block.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Render one record in [`COLUMNS`] order; missing fields become empty cells
pub fn encode_row(record: &AnalysisRecord) -> String {
    let cells = [
        text_cell(record.timestamp.as_deref()),
        text_cell(record.author.as_deref()),
        text_cell(record.original_message.as_deref()),
        text_cell(record.cleaned_message.as_deref()),
        text_cell(record.sentiment_label.map(|l| l.as_str())),
        score_cell(record.sentiment_score),
        text_cell(record.toxicity_label.map(|l| l.as_str())),
        score_cell(record.toxicity_score),
        text_cell(record.error.as_deref()),
    ];
    cells.join(",")
}

fn text_cell(value: Option<&str>) -> String {
    value.map(escape_field).unwrap_or_default()
}

fn score_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{:.1}", v),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Quote a field when it contains a delimiter, quote or line break
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatmood_common::{SentimentLabel, ToxicityLabel};

    fn scored(author: &str, text: &str) -> AnalysisRecord {
        AnalysisRecord {
            timestamp: Some("2024-05-01T12:00:00.000000+00:00".into()),
            author: Some(author.into()),
            original_message: Some(text.into()),
            cleaned_message: Some(text.to_lowercase()),
            sentiment_label: Some(SentimentLabel::Negative),
            sentiment_score: Some(-0.75),
            toxicity_label: Some(ToxicityLabel::LexicalToxic),
            toxicity_score: Some(0.6),
            contains_negative_word: Some(true),
            error: None,
        }
    }

    fn batch(n: usize) -> Vec<AnalysisRecord> {
        (0..n).map(|i| scored("viewer", &format!("msg {}", i))).collect()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_encode_row_column_order() {
        let row = encode_row(&scored("alice", "Hello"));
        assert_eq!(
            row,
            "2024-05-01T12:00:00.000000+00:00,alice,Hello,hello,NEGATIVE,-0.75,toxic,0.6,"
        );
    }

    #[test]
    fn test_encode_row_missing_fields_are_empty() {
        let record = AnalysisRecord {
            author: Some("bob".into()),
            cleaned_message: Some("hi".into()),
            error: Some("Classifier failed: boom".into()),
            ..Default::default()
        };
        assert_eq!(encode_row(&record), ",bob,,hi,,,,,Classifier failed: boom");
        assert_eq!(encode_row(&AnalysisRecord::default()).matches(',').count(), 8);
    }

    #[test]
    fn test_encode_row_quotes_special_characters() {
        let record = AnalysisRecord {
            original_message: Some("I hate this, it's \"so\" bad\nreally".into()),
            ..Default::default()
        };
        let row = encode_row(&record);
        assert!(row.contains("\"I hate this, it's \"\"so\"\" bad\nreally\""));
    }

    #[test]
    fn test_whole_scores_keep_decimal_point() {
        let record = AnalysisRecord::neutral_with_error(Some(String::new()), "Empty message");
        assert_eq!(encode_row(&record), ",,,,NEUTRAL,0.0,NOT_TOXIC,0.0,Empty message");
    }

    #[tokio::test]
    async fn test_header_written_once_across_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("chat_test.csv");

        let sizes = [3usize, 1, 5, 2];
        for size in sizes {
            append_batch(&path, &batch(size)).await.unwrap();
        }

        let lines = read_lines(&path);
        let header = COLUMNS.join(",");
        assert_eq!(lines.iter().filter(|l| **l == header).count(), 1);
        assert_eq!(lines[0], header);
        assert_eq!(lines.len() - 1, sizes.iter().sum::<usize>());
    }

    #[tokio::test]
    async fn test_existing_file_gets_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.csv");
        std::fs::write(&path, "").unwrap();

        append_batch(&path, &batch(2)).await.unwrap();
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2024-05-01"));
    }

    #[tokio::test]
    async fn test_flush_empty_queue_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.csv");
        let queue = Arc::new(IngestQueue::new(10));
        let writer = BatchWriter::new(
            queue,
            ActiveDataset::new(dir.path(), &path),
            Duration::from_secs(5),
        );

        assert!(matches!(writer.flush().await, FlushOutcome::Empty));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_flush_reads_current_file_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        let queue = Arc::new(IngestQueue::new(10));
        let dataset = ActiveDataset::new(dir.path(), &first);
        let writer = BatchWriter::new(Arc::clone(&queue), dataset.clone(), Duration::from_secs(5));

        queue.enqueue(scored("a", "one"));
        writer.flush().await;
        dataset.switch_to(second.clone()).await;
        queue.enqueue(scored("b", "two"));
        queue.enqueue(scored("c", "three"));
        writer.flush().await;

        assert_eq!(read_lines(&first).len(), 2);
        let second_lines = read_lines(&second);
        assert_eq!(second_lines.len(), 3);
        assert_eq!(second_lines[0], COLUMNS.join(","));
        assert_eq!(writer.stats().snapshot().rows_written, 3);
    }

    #[tokio::test]
    async fn test_write_failure_drops_batch_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected makes create_dir_all fail
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a dir").unwrap();
        let bad = blocker.join("chat.csv");
        let good = dir.path().join("good.csv");

        let queue = Arc::new(IngestQueue::new(10));
        let dataset = ActiveDataset::new(dir.path(), &bad);
        let writer = BatchWriter::new(Arc::clone(&queue), dataset.clone(), Duration::from_secs(5));

        queue.enqueue(scored("a", "lost"));
        queue.enqueue(scored("b", "lost too"));
        let outcome = writer.flush().await;
        assert!(matches!(outcome, FlushOutcome::Dropped { rows: 2, .. }));
        assert!(queue.is_empty(), "dropped batch must not be re-queued");

        dataset.switch_to(good.clone()).await;
        queue.enqueue(scored("c", "kept"));
        assert!(matches!(writer.flush().await, FlushOutcome::Written { rows: 1, .. }));

        let snapshot = writer.stats().snapshot();
        assert_eq!(snapshot.batches_dropped, 1);
        assert_eq!(snapshot.rows_dropped, 2);
        assert_eq!(snapshot.rows_written, 1);
        assert_eq!(read_lines(&good).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tick_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tick.csv");
        let queue = Arc::new(IngestQueue::new(10));
        let writer = BatchWriter::new(
            Arc::clone(&queue),
            ActiveDataset::new(dir.path(), &path),
            Duration::from_secs(5),
        );
        let stats = writer.stats();
        let shutdown = CancellationToken::new();
        let handle = writer.spawn(shutdown.clone());

        queue.enqueue(scored("a", "tick"));
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        // Let the flush's file I/O finish on the blocking pool
        for _ in 0..50 {
            if stats.snapshot().flushes == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stats.snapshot().flushes, 1);
        assert!(queue.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_performs_final_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final.csv");
        let queue = Arc::new(IngestQueue::new(10));
        let writer = BatchWriter::new(
            Arc::clone(&queue),
            ActiveDataset::new(dir.path(), &path),
            Duration::from_secs(3600),
        );
        let shutdown = CancellationToken::new();
        let handle = writer.spawn(shutdown.clone());

        queue.enqueue(scored("a", "late one"));
        queue.enqueue(scored("b", "late two"));
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(read_lines(&path).len(), 3);
        assert!(queue.is_empty());
    }
}
