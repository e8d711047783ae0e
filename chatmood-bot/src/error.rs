//! Error types for chatmood-bot

use thiserror::Error;

/// Upstream live chat failures
#[derive(Debug, Error)]
pub enum SourceError {
    /// Chat is gone (not found, ended, disabled) or the cursor was rejected;
    /// polling must stop
    #[error("Live chat unavailable ({reason}): {message}")]
    ChatNotFound { reason: String, message: String },

    /// Quota or rate limit hit
    #[error("Quota exceeded ({reason}): {message}")]
    QuotaExceeded { reason: String, message: String },

    #[error("API key rejected ({reason}): {message}")]
    InvalidCredentials { reason: String, message: String },

    #[error("Video '{0}' not found")]
    VideoNotFound(String),

    #[error("Video '{0}' is not a live stream or is over")]
    NotLive(String),

    #[error("No active live chat for video '{0}'. Is the stream live right now?")]
    NoActiveChat(String),

    /// Any other upstream error response
    #[error("YouTube API error {status} ({reason}): {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl SourceError {
    /// The live chat is gone for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, SourceError::ChatNotFound { .. })
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, SourceError::QuotaExceeded { .. })
    }
}

/// Failures talking to chatmood-srv
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Server answered 200 with an `error` field
    #[error("Server error: {0}")]
    Rejected(String),

    #[error("Unexpected server response: {0}")]
    Decode(String),
}
