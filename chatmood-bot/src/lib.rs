//! chatmood-bot library interface
//!
//! Polls a YouTube live chat and forwards every text message to chatmood-srv.

pub mod error;
pub mod forward;
pub mod poller;
pub mod youtube;

pub use crate::error::{ForwardError, SourceError};
pub use crate::forward::{Forwarder, IntakeClient};
pub use crate::poller::{CycleOutcome, Poller, PollerStats};
pub use crate::youtube::{ChatSource, LiveChat, PollBatch, SourceMessage, YouTubeClient};
