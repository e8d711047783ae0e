//! YouTube Data API v3 live chat source
//!
//! Two calls are used: `videos.list` (part=liveStreamingDetails) once at
//! startup to find the active live chat, then `liveChatMessages.list`
//! (part=snippet,authorDetails) on every poll cycle.
//!
//! Error responses carry the Google error envelope; its first `reason`
//! decides how the poller reacts (see [`classify_error`]).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SourceError;

const USER_AGENT: &str = concat!("chatmood-bot/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Used when the response omits `pollingIntervalMillis`
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 10_000;

/// One upstream chat message
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMessage {
    pub author: String,
    /// Absent for super chats, stickers and other non-text events
    pub display_text: Option<String>,
    pub published_at: String,
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollBatch {
    pub messages: Vec<SourceMessage>,
    pub next_cursor: Option<String>,
    pub polling_interval_ms: u64,
}

/// Anything the poller can read chat messages from
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Fetch messages after `cursor` (`None` on the first poll)
    async fn poll(&self, cursor: Option<&str>) -> Result<PollBatch, SourceError>;
}

// ---- wire format ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessageList {
    #[serde(default)]
    items: Vec<LiveChatMessage>,
    next_page_token: Option<String>,
    polling_interval_millis: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveChatMessage {
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    author_details: AuthorDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    display_message: Option<String>,
    #[serde(default)]
    published_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorDetails {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Map an error response onto a [`SourceError`]
pub fn classify_error(status: u16, body: &str) -> SourceError {
    let (reason, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .errors
                .into_iter()
                .map(|detail| detail.reason)
                .find(|reason| !reason.is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            (reason, envelope.error.message)
        }
        Err(_) => ("unknown".to_string(), body.trim().to_string()),
    };

    match reason.as_str() {
        "liveChatNotFound" | "liveChatEnded" | "liveChatDisabled" | "pageTokenInvalid" => {
            SourceError::ChatNotFound { reason, message }
        }
        "quotaExceeded" | "rateLimitExceeded" => SourceError::QuotaExceeded { reason, message },
        "keyInvalid" | "keyExpired" => SourceError::InvalidCredentials { reason, message },
        _ => SourceError::Api {
            status,
            reason,
            message,
        },
    }
}

/// Parse a `liveChatMessages.list` body
pub fn parse_message_list(body: &str) -> Result<PollBatch, SourceError> {
    let list: LiveChatMessageList =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;

    Ok(PollBatch {
        messages: list
            .items
            .into_iter()
            .map(|item| SourceMessage {
                author: item.author_details.display_name,
                display_text: item.snippet.display_message,
                published_at: item.snippet.published_at,
            })
            .collect(),
        next_cursor: list.next_page_token,
        polling_interval_ms: list
            .polling_interval_millis
            .unwrap_or(DEFAULT_POLLING_INTERVAL_MS),
    })
}

/// Pull the active live chat ID out of a `videos.list` body
pub fn parse_live_chat_id(video_id: &str, body: &str) -> Result<String, SourceError> {
    let videos: VideoListResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;

    let video = videos
        .items
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::VideoNotFound(video_id.to_string()))?;
    let details = video
        .live_streaming_details
        .ok_or_else(|| SourceError::NotLive(video_id.to_string()))?;
    details
        .active_live_chat_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SourceError::NoActiveChat(video_id.to_string()))
}

/// YouTube Data API client
#[derive(Clone)]
pub struct YouTubeClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// GET `{api_base}/{resource}`, returning the body of a 2xx response
    async fn get(&self, resource: &str, query: &[(&str, &str)]) -> Result<String, SourceError> {
        let url = format!("{}/{}", self.api_base, resource);
        let response = self
            .http_client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }
        Ok(body)
    }

    /// Find the active live chat of `video_id`
    pub async fn resolve_live_chat_id(&self, video_id: &str) -> Result<String, SourceError> {
        let body = self
            .get(
                "videos",
                &[("part", "liveStreamingDetails"), ("id", video_id)],
            )
            .await?;
        let live_chat_id = parse_live_chat_id(video_id, &body)?;
        info!("Live Chat ID found: {}", live_chat_id);
        Ok(live_chat_id)
    }

    /// Bind this client to one live chat
    pub fn live_chat(self, live_chat_id: impl Into<String>) -> LiveChat {
        LiveChat {
            client: self,
            live_chat_id: live_chat_id.into(),
        }
    }
}

/// [`ChatSource`] reading one live chat
#[derive(Clone)]
pub struct LiveChat {
    client: YouTubeClient,
    live_chat_id: String,
}

#[async_trait]
impl ChatSource for LiveChat {
    async fn poll(&self, cursor: Option<&str>) -> Result<PollBatch, SourceError> {
        let mut query = vec![
            ("liveChatId", self.live_chat_id.as_str()),
            ("part", "snippet,authorDetails"),
        ];
        if let Some(token) = cursor {
            query.push(("pageToken", token));
        }

        let body = self.client.get("liveChat/messages", &query).await?;
        let batch = parse_message_list(&body)?;
        debug!(
            count = batch.messages.len(),
            interval_ms = batch.polling_interval_ms,
            "Polled live chat"
        );
        Ok(batch)
    }
}
