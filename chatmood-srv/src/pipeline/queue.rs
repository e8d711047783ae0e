//! Ingestion queue
//!
//! Bounded in-memory FIFO between classification and disk persistence.
//! Backpressure policy is drop-newest: a full queue rejects the incoming record
//! immediately and counts the drop. Enqueue never waits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chatmood_common::AnalysisRecord;
use serde::Serialize;

/// Snapshot of queue counters for `/health`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueStats {
    pub len: usize,
    pub capacity: usize,
    pub accepted: u64,
    pub dropped: u64,
}

pub struct IngestQueue {
    records: Mutex<VecDeque<AnalysisRecord>>,
    capacity: usize,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl IngestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AnalysisRecord>> {
        // A panic while holding the lock cannot leave the deque half-updated
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record; `false` means the queue was full and the record is gone
    pub fn enqueue(&self, record: AnalysisRecord) -> bool {
        let mut records = self.lock();
        if records.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        records.push_back(record);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Take everything currently queued, oldest first
    pub fn drain_all(&self) -> Vec<AnalysisRecord> {
        let mut records = self.lock();
        records.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.len(),
            capacity: self.capacity,
            accepted: self.accepted_count(),
            dropped: self.dropped_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(n: usize) -> AnalysisRecord {
        AnalysisRecord {
            original_message: Some(format!("message {}", n)),
            ..Default::default()
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = IngestQueue::new(10);
        for n in 0..3 {
            assert!(queue.enqueue(record(n)));
        }
        let drained = queue.drain_all();
        let messages: Vec<_> = drained
            .iter()
            .map(|r| r.original_message.clone().unwrap())
            .collect();
        assert_eq!(messages, vec!["message 0", "message 1", "message 2"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rejects_beyond_capacity_and_counts() {
        let queue = IngestQueue::new(3);
        let results: Vec<bool> = (0..5).map(|n| queue.enqueue(record(n))).collect();
        assert_eq!(results, vec![true, true, true, false, false]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped_count(), 2);
        assert_eq!(queue.accepted_count(), 3);

        // Drop-newest: the survivors are the first three
        let drained = queue.drain_all();
        assert_eq!(drained[2].original_message.as_deref(), Some("message 2"));
    }

    #[test]
    fn test_space_frees_after_drain() {
        let queue = IngestQueue::new(1);
        assert!(queue.enqueue(record(0)));
        assert!(!queue.enqueue(record(1)));
        assert_eq!(queue.drain_all().len(), 1);
        assert!(queue.enqueue(record(2)));
    }

    #[test]
    fn test_drain_empty_returns_immediately() {
        let queue = IngestQueue::new(5);
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_concurrent_burst_never_exceeds_capacity() {
        let capacity = 100;
        let queue = Arc::new(IngestQueue::new(capacity));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        queue.enqueue(record(t * 1000 + n));
                        assert!(queue.len() <= capacity);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), capacity);
        assert_eq!(queue.accepted_count(), capacity as u64);
        assert_eq!(queue.dropped_count(), 400 - capacity as u64);
    }

    #[test]
    fn test_concurrent_drains_partition_records() {
        let queue = Arc::new(IngestQueue::new(10_000));
        for n in 0..5_000 {
            queue.enqueue(record(n));
        }
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || queue.drain_all().len())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 5_000);
    }

    #[test]
    fn test_stats_snapshot() {
        let queue = IngestQueue::new(2);
        queue.enqueue(record(0));
        queue.enqueue(record(1));
        queue.enqueue(record(2));
        assert_eq!(
            queue.stats(),
            QueueStats {
                len: 2,
                capacity: 2,
                accepted: 2,
                dropped: 1
            }
        );
    }
}
