//! Transcoding module
//!
//! Re-encodes sources the player cannot decode into HLS:
//! - ffmpeg process management, one session at a time
//! - Per-session output directories served under `/transcode/`
//! - Container detection for sources that need transcoding

pub mod formats;
pub mod manager;

pub use formats::needs_transcoding;
pub use manager::{SessionStatus, TranscodeManager};
