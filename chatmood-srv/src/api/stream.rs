//! Session control
//!
//! `POST /set_stream` starts a new dataset file for a video. An unparseable
//! URL is answered with a 200 and an `error` field so the bot can report it.

use axum::{extract::State, routing::post, Json, Router};
use chatmood_common::{pointer, video};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ApiResult, AppState};

pub const INVALID_URL: &str = "Invalid YouTube URL.";

#[derive(Debug, Deserialize)]
pub struct SetStreamRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SetStreamResponse {
    Started { status: &'static str, file: String },
    Rejected { error: &'static str },
}

/// POST /set_stream
pub async fn set_stream(
    State(state): State<AppState>,
    Json(req): Json<SetStreamRequest>,
) -> ApiResult<Json<SetStreamResponse>> {
    let Some(video_id) = video::extract_video_id(&req.url) else {
        warn!(url = %req.url, "Rejected stream URL");
        return Ok(Json(SetStreamResponse::Rejected { error: INVALID_URL }));
    };

    let path = state.dataset.prepare_session(&video_id).await?;
    let file = path.to_string_lossy().to_string();

    // Pointer first: a failed write leaves the previous session active
    if let Some(pointer_file) = &state.pointer_file {
        pointer::write_pointer(pointer_file, &file)?;
        info!("Updated stream pointer {}", pointer_file.display());
    }
    state.dataset.activate(path).await;

    Ok(Json(SetStreamResponse::Started { status: "ok", file }))
}

pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/set_stream", post(set_stream))
}
