//! Media sink contract
//!
//! The sink is the single platform video element. It owns the transport
//! (play/pause/seek/volume) and reports lifecycle events back to the
//! orchestrator as [`SinkEvent`]s. Only the orchestrator and the engine it
//! attaches ever touch it.

use serde::Serialize;

/// Error codes reported by the sink's built-in decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
}

impl MediaErrorCode {
    /// Map the platform's numeric media error code (1-4).
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Aborted),
            2 => Some(Self::Network),
            3 => Some(Self::Decode),
            4 => Some(Self::SrcNotSupported),
            _ => None,
        }
    }

    /// User facing description; never shows the raw code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Aborted => "Video loading aborted",
            Self::Network => "Network error - check your connection",
            Self::Decode => "Video decode error - format may not be supported",
            Self::SrcNotSupported => "Video format not supported",
        }
    }
}

/// Lifecycle events emitted by the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// First frame decoded
    LoadedData,
    /// Enough data to start playing
    CanPlay,
    /// Play requested (user or autoplay)
    Play,
    /// Frames are being rendered
    Playing,
    Pause,
    /// Playback stalled waiting for data
    Waiting,
    /// Playback position advanced; carries the trailing edge of the last
    /// buffered range when one exists
    TimeUpdate {
        position: f64,
        buffered_end: Option<f64>,
    },
    /// Duration became known; live streams report infinity
    DurationChange(f64),
    Error(MediaErrorCode),
}

/// Snapshot of the sink's clock and buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SinkTiming {
    pub position: f64,
    /// Finite duration, when known
    pub duration: Option<f64>,
    /// End of the last buffered range, when anything is buffered
    pub buffered_end: Option<f64>,
}

/// Platform video element.
pub trait MediaSink: Send {
    /// Point the built-in decoder at a URL.
    fn set_source(&mut self, url: &str);

    /// Drop the current source and release decoder buffers.
    fn clear_source(&mut self);

    /// (Re)start loading the current source.
    fn load(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, position: f64);

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    fn timing(&self) -> SinkTiming;

    /// Whether the built-in decoder understands HLS manifests.
    fn supports_native_manifest(&self) -> bool {
        false
    }
}
