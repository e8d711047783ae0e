//! Poll loop
//!
//! One cycle: poll with the current cursor, forward every message that has
//! display text, then sleep for as long as the outcome says. The cursor is
//! replaced by whatever a successful poll returns and kept across failures.
//!
//! After a failed poll:
//! - chat not found, ended or disabled, or the page token rejected: stop
//! - quota or rate limit: wait 60 s
//! - anything else: wait 10 s

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::forward::Forwarder;
use crate::youtube::{ChatSource, PollBatch};

pub const QUOTA_BACKOFF: Duration = Duration::from_secs(60);
pub const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// What the loop does after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue(Duration),
    Terminate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub polls: u64,
    pub poll_errors: u64,
    pub forwarded: u64,
    pub skipped: u64,
    pub forward_failures: u64,
}

pub struct Poller<S, F> {
    source: S,
    forwarder: F,
    cursor: Option<String>,
    stats: PollerStats,
}

impl<S: ChatSource, F: Forwarder> Poller<S, F> {
    pub fn new(source: S, forwarder: F) -> Self {
        Self {
            source,
            forwarder,
            cursor: None,
            stats: PollerStats::default(),
        }
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn stats(&self) -> &PollerStats {
        &self.stats
    }

    /// Run one poll cycle
    pub async fn step(&mut self) -> CycleOutcome {
        self.stats.polls += 1;

        match self.source.poll(self.cursor.as_deref()).await {
            Ok(batch) => {
                let interval = Duration::from_millis(batch.polling_interval_ms);
                self.cursor = batch.next_cursor.clone();
                self.forward_batch(batch).await;
                CycleOutcome::Continue(interval)
            }
            Err(e) if e.is_terminal() => {
                error!("Error fetching chat: {}", e);
                info!("--- CHAT ENDED ---");
                CycleOutcome::Terminate
            }
            Err(e) if e.is_quota() => {
                self.stats.poll_errors += 1;
                warn!("{}; waiting {} seconds", e, QUOTA_BACKOFF.as_secs());
                CycleOutcome::Continue(QUOTA_BACKOFF)
            }
            Err(e) => {
                self.stats.poll_errors += 1;
                error!("Error fetching chat: {}", e);
                CycleOutcome::Continue(ERROR_BACKOFF)
            }
        }
    }

    async fn forward_batch(&mut self, batch: PollBatch) {
        if batch.messages.is_empty() {
            info!("No new messages yet.");
            return;
        }

        info!("Found {} new messages...", batch.messages.len());
        for message in batch.messages {
            let Some(text) = message.display_text.filter(|t| !t.is_empty()) else {
                // Super chats, stickers and membership events
                self.stats.skipped += 1;
                continue;
            };

            info!("[{}] {}: {}", message.published_at, message.author, text);
            match self.forwarder.forward(&message.author, &text).await {
                Ok(()) => self.stats.forwarded += 1,
                Err(e) => {
                    self.stats.forward_failures += 1;
                    warn!("Failed to send message to API: {}", e);
                }
            }
        }
    }

    /// Poll until the chat ends or `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) -> PollerStats {
        info!("Polling live chat... Press Ctrl+C to stop.");

        loop {
            let wait = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.step() => match outcome {
                    CycleOutcome::Continue(wait) => wait,
                    CycleOutcome::Terminate => break,
                },
            };

            info!("(Waiting for {:.1} seconds before next poll...)", wait.as_secs_f64());
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!(
            polls = self.stats.polls,
            forwarded = self.stats.forwarded,
            skipped = self.stats.skipped,
            forward_failures = self.stats.forward_failures,
            "Poller stopped"
        );
        self.stats
    }
}
