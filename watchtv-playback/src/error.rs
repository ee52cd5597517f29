use serde::Serialize;
use thiserror::Error;

/// Errors raised by the ambient plumbing of the playback core (stores,
/// transcode RPC, configuration). Playback failures themselves are modelled
/// as [`ErrorRecord`]s and travel through the state machine instead.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transcode server could not be reached
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The transcode server answered with a failure
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// Invalid player configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Classified playback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// User or navigation triggered; never surfaced as a failure
    Aborted,
    /// Network trouble; retried by the engine within its budget
    NetworkTransient,
    /// Decode error the engine may recover from once
    MediaDecodeRecoverable,
    /// The container or codec cannot be decoded on this client
    FormatUnsupported,
    /// The engine gave up
    EngineFatal,
    /// Transcoding failed or was already tried; terminal
    TranscodeUnavailable,
}

/// What the user is offered when playback fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAffordance {
    Retry,
    ExternalPlayer,
}

/// A playback error together with its human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Transient failures get a retry button, everything else points at an
    /// external player.
    pub fn affordance(&self) -> FailureAffordance {
        match self.kind {
            ErrorKind::NetworkTransient | ErrorKind::Aborted => FailureAffordance::Retry,
            _ => FailureAffordance::ExternalPlayer,
        }
    }

    /// Whether this failure should trigger the transcode fallback.
    pub fn wants_transcode(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::FormatUnsupported | ErrorKind::EngineFatal | ErrorKind::MediaDecodeRecoverable
        )
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}
