//! Stream URL parsing
//!
//! Supports the two URL shapes users paste:
//! - `https://www.youtube.com/watch?v=<id>&...`
//! - `https://youtu.be/<id>?...`

use crate::{Error, Result};

/// Extract the video identifier from a stream URL
///
/// Returns `None` when neither form is present or the identifier is empty.
pub fn extract_video_id(url: &str) -> Option<String> {
    let id = if let Some((_, after)) = url.split_once("v=") {
        after.split('&').next().unwrap_or_default()
    } else if let Some((_, after)) = url.split_once("youtu.be/") {
        after.split('?').next().unwrap_or_default()
    } else {
        return None;
    };

    let id = id.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Like [`extract_video_id`] but reports the failure as an input error
pub fn require_video_id(url: &str) -> Result<String> {
    extract_video_id(url)
        .ok_or_else(|| Error::InvalidInput(format!("Invalid YouTube URL: {}", url)))
}

/// Dataset file name for a new session
pub fn session_file_name(video_id: &str, stamp: &str) -> String {
    format!("chat_{}_{}.csv", video_id, stamp)
}
