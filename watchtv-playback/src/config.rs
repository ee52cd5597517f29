//! Player configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Engine retry budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Network restarts an engine may perform before giving up
    pub network_retry_budget: u32,

    /// Internal media-error recoveries before a decode error becomes fatal
    pub media_recovery_budget: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            network_retry_budget: 3,
            media_recovery_budget: 1,
        }
    }
}

/// Live-edge repositioning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveEdgeConfig {
    /// Distance kept behind the end of the buffered range, in seconds
    pub buffer_safety_offset: f64,

    /// Distance kept before the end of a finite duration, in seconds
    pub duration_safety_offset: f64,
}

impl Default for LiveEdgeConfig {
    fn default() -> Self {
        Self {
            buffer_safety_offset: 1.0,
            duration_safety_offset: 0.5,
        }
    }
}

/// Adaptive-manifest engine buffering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Forward buffer target for live streams in seconds
    pub live_max_buffer_secs: f64,

    /// Forward buffer target for on-demand assets in seconds
    pub vod_max_buffer_secs: f64,

    /// Absolute forward buffer ceiling for live streams in seconds
    pub live_max_max_buffer_secs: f64,

    /// Absolute forward buffer ceiling for on-demand assets in seconds
    pub vod_max_max_buffer_secs: f64,

    /// Maximum buffer size in megabytes
    pub max_buffer_size_mb: usize,

    /// Largest gap in the buffer that is skipped over, in seconds
    pub max_buffer_hole_secs: f64,

    /// Segments kept between playback and the live edge
    pub live_sync_segments: u32,

    /// Segments behind live before the engine jumps forward
    pub live_max_latency_segments: u32,

    /// Fragment load retries
    pub fragment_retries: u32,

    /// Delay between fragment retries in milliseconds
    pub fragment_retry_delay_ms: u64,

    /// Cap on the fragment retry back-off in milliseconds
    pub fragment_retry_timeout_ms: u64,

    /// Initial bandwidth estimate in bits per second
    pub initial_bandwidth_estimate: u64,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            live_max_buffer_secs: 30.0,
            vod_max_buffer_secs: 60.0,
            live_max_max_buffer_secs: 60.0,
            vod_max_max_buffer_secs: 120.0,
            max_buffer_size_mb: 60,
            max_buffer_hole_secs: 0.5,
            live_sync_segments: 4,
            live_max_latency_segments: 12,
            fragment_retries: 6,
            fragment_retry_delay_ms: 1000,
            fragment_retry_timeout_ms: 64_000,
            initial_bandwidth_estimate: 500_000,
        }
    }
}

impl ManifestConfig {
    /// Maximum buffer size in bytes
    pub fn max_buffer_size_bytes(&self) -> usize {
        self.max_buffer_size_mb.saturating_mul(1000 * 1000)
    }
}

/// Playback controls overlay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Pointer inactivity before the controls hide, in milliseconds
    pub hide_after_ms: u64,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self { hide_after_ms: 3000 }
    }
}

impl ControlsConfig {
    pub fn hide_after(&self) -> Duration {
        Duration::from_millis(self.hide_after_ms)
    }
}

/// Player configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub retry: RetryConfig,
    pub live_edge: LiveEdgeConfig,
    pub manifest: ManifestConfig,
    pub controls: ControlsConfig,
}

impl PlayerConfig {
    /// Load configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engines cannot work with
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("live_edge.buffer_safety_offset", self.live_edge.buffer_safety_offset),
            ("live_edge.duration_safety_offset", self.live_edge.duration_safety_offset),
            ("manifest.live_max_buffer_secs", self.manifest.live_max_buffer_secs),
            ("manifest.vod_max_buffer_secs", self.manifest.vod_max_buffer_secs),
            ("manifest.live_max_max_buffer_secs", self.manifest.live_max_max_buffer_secs),
            ("manifest.vod_max_max_buffer_secs", self.manifest.vod_max_max_buffer_secs),
            ("manifest.max_buffer_hole_secs", self.manifest.max_buffer_hole_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(PlaybackError::Config(format!(
                    "{} must be a finite, non-negative number of seconds (got {})",
                    name, value
                )));
            }
        }
        if self.manifest.live_max_buffer_secs == 0.0 || self.manifest.vod_max_buffer_secs == 0.0 {
            return Err(PlaybackError::Config(
                "manifest buffer targets must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
