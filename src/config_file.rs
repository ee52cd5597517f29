//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{ServerConfig, TranscodeConfig};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Transcode settings
    pub transcode: Option<TranscodeSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscodeSettings {
    /// ffmpeg binary
    pub ffmpeg_path: Option<String>,
    /// Root directory for session output
    pub output_root: Option<PathBuf>,
    /// x264 preset
    pub preset: Option<String>,
    /// AAC bitrate, e.g. "128k"
    pub audio_bitrate: Option<String>,
    /// HLS segment duration in seconds
    pub segment_secs: Option<u32>,
    /// Seconds to wait for the first playlist
    pub ready_timeout_secs: Option<u64>,
    /// Host name used in returned URLs
    pub public_host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let transcode = TranscodeConfig::default();
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
                cors_enabled: Some(true),
            },
            transcode: Some(TranscodeSettings {
                ffmpeg_path: Some(transcode.ffmpeg_path),
                output_root: Some(transcode.output_root),
                preset: Some(transcode.preset),
                audio_bitrate: Some(transcode.audio_bitrate),
                segment_secs: Some(transcode.segment_secs),
                ready_timeout_secs: Some(transcode.ready_timeout_secs),
                public_host: Some(transcode.public_host),
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = TranscodeConfig::default();
        let t = self.transcode.unwrap_or_default();
        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or_else(|| "pretty".to_string())),
            None => ("info".to_string(), "pretty".to_string()),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            transcode: TranscodeConfig {
                ffmpeg_path: t.ffmpeg_path.unwrap_or(defaults.ffmpeg_path),
                output_root: t.output_root.unwrap_or(defaults.output_root),
                preset: t.preset.unwrap_or(defaults.preset),
                audio_bitrate: t.audio_bitrate.unwrap_or(defaults.audio_bitrate),
                segment_secs: t.segment_secs.unwrap_or(defaults.segment_secs),
                ready_timeout_secs: t.ready_timeout_secs.unwrap_or(defaults.ready_timeout_secs),
                public_host: t.public_host.unwrap_or(defaults.public_host),
            },
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level,
            log_format,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
