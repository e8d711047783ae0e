//! Chat intake endpoints
//!
//! `POST /fetch_chat` acknowledges before any analysis happens. The message is
//! handed to the analysis pool; overload drops are logged there, never
//! reported to the caller.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chatmood_common::ChatMessage;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::AppState;

/// Body of `POST /fetch_chat`
#[derive(Debug, Deserialize)]
pub struct FetchChatRequest {
    pub user: String,
    /// Non-string values are treated as empty text
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct FetchChatResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    #[serde(rename = "Message")]
    pub message: &'static str,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => text,
        _ => String::new(),
    })
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Sentiment Analysis API is running.",
    })
}

/// POST /fetch_chat
pub async fn fetch_chat(
    State(state): State<AppState>,
    Json(req): Json<FetchChatRequest>,
) -> Json<FetchChatResponse> {
    debug!(author = %req.user, "Chat message received");
    state.intake.submit(ChatMessage::new(req.user, req.text));

    Json(FetchChatResponse {
        status: "ok",
        message: "Message queued for processing.",
    })
}

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/fetch_chat", post(fetch_chat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_string_text_becomes_empty() {
        let req: FetchChatRequest = serde_json::from_str(r#"{"user":"bob","text":42}"#).unwrap();
        assert_eq!(req.text, "");

        let req: FetchChatRequest = serde_json::from_str(r#"{"user":"bob"}"#).unwrap();
        assert_eq!(req.text, "");

        let req: FetchChatRequest =
            serde_json::from_str(r#"{"user":"bob","text":"hi there"}"#).unwrap();
        assert_eq!(req.text, "hi there");
    }
}
