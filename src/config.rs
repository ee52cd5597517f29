//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// ffmpeg transcoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// ffmpeg binary, either a name looked up on PATH or a full path
    pub ffmpeg_path: String,

    /// Directory under which each session gets its own output directory
    pub output_root: PathBuf,

    /// x264 preset
    pub preset: String,

    /// AAC bitrate in ffmpeg notation
    pub audio_bitrate: String,

    /// Target HLS segment duration in seconds
    pub segment_secs: u32,

    /// How long to wait for ffmpeg to write the first playlist
    pub ready_timeout_secs: u64,

    /// Host name placed in the URLs handed to players
    pub public_host: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            output_root: std::env::temp_dir().join("watchtv_transcode"),
            preset: "ultrafast".to_string(),
            audio_bitrate: "128k".to_string(),
            segment_secs: 4,
            ready_timeout_secs: 15,
            public_host: "127.0.0.1".to_string(),
        }
    }
}

impl TranscodeConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Transcoding configuration
    pub transcode: TranscodeConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            transcode: TranscodeConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL players use to reach this server
    pub fn public_base_url(&self) -> String {
        format!("http://{}:{}", self.transcode.public_host, self.port)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
