//! Transcode bridge
//!
//! The orchestrator talks to the transcoder through [`TranscodeBridge`]:
//! non-blocking `start`/`stop` requests whose results come back later as
//! [`Input::TranscodeFinished`](crate::orchestrator::Input) carrying the
//! ticket they were issued with.
//!
//! - [`TokioTranscodeBridge`]: runs requests in order on a worker task
//!   against any async [`Transcoder`]
//! - [`HttpTranscoder`]: JSON RPC client for `watchtv-server`

pub mod http;
pub mod worker;

pub use http::HttpTranscoder;
pub use worker::TokioTranscodeBridge;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

use crate::error::Result;

/// Identity of one transcode request. A result whose ticket is no longer
/// pending belongs to a superseded source and is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TranscodeTicket(pub u64);

impl fmt::Display for TranscodeTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transcode#{}", self.0)
    }
}

/// Orchestrator-facing side of the bridge. Both calls return immediately.
pub trait TranscodeBridge: Send {
    /// Ask for a playable URL for `source_path`. Starting implicitly stops
    /// any earlier session.
    fn start(&mut self, ticket: TranscodeTicket, source_path: &str);

    /// Stop the active session, if any. Idempotent; failures are swallowed.
    fn stop(&mut self);
}

/// Async transcoder driven by [`TokioTranscodeBridge`].
pub trait Transcoder: Send + Sync + 'static {
    /// Start transcoding and resolve to a browser-playable URL.
    fn start(&self, source_path: &str) -> impl Future<Output = Result<String>> + Send;

    /// Stop the active session. Stopping nothing is not an error.
    fn stop(&self) -> impl Future<Output = Result<()>> + Send;
}

/// `POST /api/transcode` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub source_path: String,
}

/// `POST /api/transcode` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeResponse {
    pub session_id: String,
    pub url: String,
}

/// Error body returned by the transcode server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
