//! Playback core for the WatchTV IPTV player.
//!
//! Resolves an opaque source reference into a playing video: classifies the
//! reference, attaches the matching decode engine to the media sink, supervises
//! it, and falls back to server-side transcoding when no client-side pathway
//! can render the content.

pub mod bridge;
pub mod classifier;
pub mod config;
pub mod controls;
pub mod driver;
pub mod engine;
pub mod error;
pub mod live_edge;
pub mod orchestrator;
pub mod sink;
pub mod source;
pub mod view_state;

#[cfg(test)]
pub(crate) mod tests;

pub use bridge::{HttpTranscoder, TokioTranscodeBridge, TranscodeBridge, TranscodeTicket, Transcoder};
pub use classifier::{classify, FormatHypothesis, TransportOrigin};
pub use config::PlayerConfig;
pub use controls::ControlsAutoHide;
pub use driver::{spawn_player, PlayerHandle};
pub use engine::{EngineProvider, EngineSignal, SessionId};
pub use error::{ErrorKind, ErrorRecord, FailureAffordance, PlaybackError, Result};
pub use orchestrator::{Input, Notifier, Orchestrator, PlaybackState, PlayerStatus};
pub use sink::{MediaErrorCode, MediaSink, SinkEvent, SinkTiming};
pub use source::{ChannelInfo, SourceReference};
pub use view_state::{ContentKind, JsonFileStore, LastViewed, MemoryStore, ViewStateStore};
