//! chatmood-srv client
//!
//! `POST /set_stream` once per session, then `POST /fetch_chat` for every
//! message with display text.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ForwardError;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Destination for chat messages
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, author: &str, text: &str) -> Result<(), ForwardError>;
}

#[derive(Debug, Serialize)]
struct FetchChatBody<'a> {
    user: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SetStreamBody<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SetStreamReply {
    file: Option<String>,
    error: Option<String>,
}

/// Interpret a `set_stream` reply, returning the new dataset path
pub fn parse_set_stream_reply(status: u16, body: &str) -> Result<String, ForwardError> {
    if !(200..300).contains(&status) {
        return Err(ForwardError::Status {
            status,
            body: body.to_string(),
        });
    }

    let reply: SetStreamReply =
        serde_json::from_str(body).map_err(|e| ForwardError::Decode(e.to_string()))?;
    match (reply.file, reply.error) {
        (Some(file), _) if !file.is_empty() => Ok(file),
        (_, Some(error)) => Err(ForwardError::Rejected(error)),
        _ => Err(ForwardError::Rejected("Unknown error".to_string())),
    }
}

/// HTTP client for chatmood-srv
#[derive(Clone)]
pub struct IntakeClient {
    http_client: reqwest::Client,
    server_url: String,
}

impl IntakeClient {
    pub fn new(server_url: impl Into<String>) -> Result<Self, ForwardError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http_client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Start a new dataset on the server for `url`
    pub async fn set_stream(&self, url: &str) -> Result<String, ForwardError> {
        let response = self
            .http_client
            .post(format!("{}/set_stream", self.server_url))
            .json(&SetStreamBody { url })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_set_stream_reply(status, &body)
    }
}

#[async_trait]
impl Forwarder for IntakeClient {
    async fn forward(&self, author: &str, text: &str) -> Result<(), ForwardError> {
        let response = self
            .http_client
            .post(format!("{}/fetch_chat", self.server_url))
            .json(&FetchChatBody { user: author, text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForwardError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(author, "Forwarded message");
        Ok(())
    }
}
