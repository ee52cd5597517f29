//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use thiserror::Error;
use watchtv_playback::bridge::ErrorBody;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Failures starting or running ffmpeg
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to start FFmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("FFmpeg exited before producing a playlist ({0})")]
    ExitedEarly(String),

    #[error("FFmpeg produced no playlist within {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Transcode(#[from] TranscodeError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
