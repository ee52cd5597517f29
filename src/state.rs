//! Application state shared across all handlers

use crate::config::ServerConfig;
use crate::transcode::TranscodeManager;

pub struct AppState {
    /// The single ffmpeg session slot
    pub transcoder: TranscodeManager,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self {
            transcoder: TranscodeManager::new(config.transcode.clone(), config.public_base_url()),
            config,
        }
    }

    /// Stop any running transcode before exit.
    pub async fn shutdown(&self) {
        if self.transcoder.stop().await {
            tracing::info!("Stopped active transcode on shutdown");
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
