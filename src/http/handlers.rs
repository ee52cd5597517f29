//! HTTP request handlers
//!
//! JSON endpoints for the transcode RPC.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use watchtv_playback::bridge::{TranscodeRequest, TranscodeResponse};

use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::transcode::{needs_transcoding, SessionStatus};

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("watchtv-server v", env!("CARGO_PKG_VERSION"))
}

/// Start transcoding, replacing any running session
/// POST /api/transcode
pub async fn start_transcode(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranscodeRequest>,
) -> Result<Json<TranscodeResponse>> {
    let source = request.source_path.trim();
    if source.is_empty() {
        return Err(ServerError::BadRequest("source_path is empty".to_string()));
    }

    let session = state.transcoder.start(source).await?;
    Ok(Json(TranscodeResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Stop the running session; stopping nothing succeeds
/// POST /api/transcode/stop
pub async fn stop_transcode(State(state): State<Arc<AppState>>) -> StatusCode {
    if !state.transcoder.stop().await {
        tracing::debug!("Stop requested with no active transcode");
    }
    StatusCode::NO_CONTENT
}

/// Active session, or `null`
/// GET /api/transcode
pub async fn transcode_status(State(state): State<Arc<AppState>>) -> Json<Option<SessionStatus>> {
    Json(state.transcoder.status().await)
}

#[derive(Debug, Deserialize)]
pub struct NeedsTranscodingQuery {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct NeedsTranscodingResponse {
    pub url: String,
    pub needs_transcoding: bool,
}

/// GET /api/needs-transcoding?url=...
pub async fn needs_transcoding_check(Query(query): Query<NeedsTranscodingQuery>) -> Json<NeedsTranscodingResponse> {
    Json(NeedsTranscodingResponse {
        needs_transcoding: needs_transcoding(&query.url),
        url: query.url,
    })
}
