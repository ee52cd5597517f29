//! Adaptive-manifest engine
//!
//! Supervises an HLS backend. Network failures restart the load within the
//! retry budget. Media failures get internal recoveries within theirs and
//! then escalate as recoverable decode errors. Anything else fatal tears the
//! engine down.

use serde::Serialize;
use std::time::Duration;

use crate::config::{ManifestConfig, RetryConfig};
use crate::error::{ErrorKind, ErrorRecord};
use crate::sink::{MediaErrorCode, MediaSink};

use super::{sink_failure, EngineOutcome, EngineSignal};

/// Error class reported by the manifest backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestErrorType {
    Network,
    Media,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestError {
    pub kind: ManifestErrorType,
    /// Non-fatal errors are handled by the backend itself
    pub fatal: bool,
    pub details: String,
}

impl ManifestError {
    pub fn fatal(kind: ManifestErrorType, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            details: details.into(),
        }
    }
}

/// Live-edge chasing parameters, present only for live streams.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSync {
    /// Segments kept between playback and the live edge
    pub sync_segments: u32,
    /// Segments behind live tolerated before jumping forward
    pub max_latency_segments: u32,
    /// Treat the duration as infinite
    pub duration_infinity: bool,
}

/// Settings handed to the manifest backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEngineConfig {
    pub url: String,
    pub enable_worker: bool,
    pub low_latency_mode: bool,
    pub live: Option<LiveSync>,
    pub max_buffer_length: Duration,
    pub max_max_buffer_length: Duration,
    pub max_buffer_size: usize,
    pub max_buffer_hole: Duration,
    pub fragment_retries: u32,
    pub fragment_retry_delay: Duration,
    pub fragment_retry_timeout: Duration,
    /// Negative means "backend decides" (live edge for live streams)
    pub start_position: f64,
    pub initial_bandwidth_estimate: u64,
    pub bandwidth_factor: f64,
    pub bandwidth_up_factor: f64,
}

impl ManifestEngineConfig {
    /// Live streams get live-edge chasing and a tighter forward buffer;
    /// on-demand assets get a deeper lookahead.
    pub fn for_source(url: &str, is_live: bool, manifest: &ManifestConfig) -> Self {
        let defaults = ManifestConfig::default();
        let (max_buffer, max_max_buffer, default_buffer, default_max_buffer) = if is_live {
            (
                manifest.live_max_buffer_secs,
                manifest.live_max_max_buffer_secs,
                defaults.live_max_buffer_secs,
                defaults.live_max_max_buffer_secs,
            )
        } else {
            (
                manifest.vod_max_buffer_secs,
                manifest.vod_max_max_buffer_secs,
                defaults.vod_max_buffer_secs,
                defaults.vod_max_max_buffer_secs,
            )
        };

        Self {
            url: url.to_string(),
            enable_worker: true,
            low_latency_mode: is_live,
            live: is_live.then(|| LiveSync {
                sync_segments: manifest.live_sync_segments,
                max_latency_segments: manifest.live_max_latency_segments,
                duration_infinity: true,
            }),
            max_buffer_length: seconds_or(max_buffer, default_buffer),
            max_max_buffer_length: seconds_or(max_max_buffer, default_max_buffer),
            max_buffer_size: manifest.max_buffer_size_bytes(),
            max_buffer_hole: seconds_or(manifest.max_buffer_hole_secs, defaults.max_buffer_hole_secs),
            fragment_retries: manifest.fragment_retries,
            fragment_retry_delay: Duration::from_millis(manifest.fragment_retry_delay_ms),
            fragment_retry_timeout: Duration::from_millis(manifest.fragment_retry_timeout_ms),
            start_position: -1.0,
            initial_bandwidth_estimate: manifest.initial_bandwidth_estimate,
            bandwidth_factor: 0.95,
            bandwidth_up_factor: 0.7,
        }
    }
}

/// Settings that skipped validation may hold negative or non-finite
/// seconds; those fall back to the default.
fn seconds_or(secs: f64, default: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| {
        tracing::warn!(secs, default, "Invalid buffer duration, using default");
        Duration::from_secs_f64(default)
    })
}

/// Platform HLS library.
pub trait ManifestBackend: Send {
    /// Begin fetching the manifest.
    fn load_source(&mut self, url: &str);

    /// Bind the backend's buffers to the sink.
    fn attach(&mut self, sink: &mut dyn MediaSink);

    /// Restart segment loading after a network failure.
    fn start_load(&mut self);

    /// Reset the media pipeline after a decode failure.
    fn recover_media_error(&mut self);

    /// Position the backend considers the live edge.
    fn live_sync_position(&self) -> Option<f64>;

    /// Stop all loading, release buffers and workers.
    fn destroy(&mut self);
}

pub struct ManifestEngine {
    backend: Box<dyn ManifestBackend>,
    config: ManifestEngineConfig,
    network_budget: u32,
    network_retries_left: u32,
    media_budget: u32,
    media_recoveries_left: u32,
}

impl ManifestEngine {
    pub fn new(backend: Box<dyn ManifestBackend>, config: ManifestEngineConfig, retry: &RetryConfig) -> Self {
        Self {
            backend,
            config,
            network_budget: retry.network_retry_budget,
            network_retries_left: retry.network_retry_budget,
            media_budget: retry.media_recovery_budget,
            media_recoveries_left: retry.media_recovery_budget,
        }
    }

    pub fn config(&self) -> &ManifestEngineConfig {
        &self.config
    }

    pub fn attach(&mut self, sink: &mut dyn MediaSink) {
        tracing::info!(
            url = %self.config.url,
            live = self.config.live.is_some(),
            "Attaching manifest engine"
        );
        self.backend.load_source(&self.config.url);
        self.backend.attach(sink);
    }

    pub fn detach(mut self, sink: &mut dyn MediaSink) {
        tracing::debug!(url = %self.config.url, "Destroying manifest engine");
        self.backend.destroy();
        sink.clear_source();
    }

    pub fn on_signal(&mut self, signal: EngineSignal) -> EngineOutcome {
        match signal {
            EngineSignal::ManifestParsed => {
                tracing::debug!("Manifest parsed");
                EngineOutcome::Ready
            }
            EngineSignal::ManifestError(err) if !err.fatal => {
                tracing::debug!(details = %err.details, "Non-fatal manifest error");
                EngineOutcome::Ignored
            }
            EngineSignal::ManifestError(err) => match err.kind {
                ManifestErrorType::Network => self.restart_load(&err.details),
                ManifestErrorType::Media => self.recover_media(&err.details),
                ManifestErrorType::Other => {
                    tracing::error!(details = %err.details, "Fatal manifest error");
                    EngineOutcome::Escalate(ErrorRecord::new(
                        ErrorKind::EngineFatal,
                        format!("Stream error: {}", err.details),
                    ))
                }
            },
            EngineSignal::DemuxError { .. } => EngineOutcome::Ignored,
        }
    }

    pub fn on_sink_error(&mut self, code: MediaErrorCode) -> EngineOutcome {
        match code {
            MediaErrorCode::Network => self.restart_load("sink network error"),
            other => EngineOutcome::Escalate(sink_failure(other)),
        }
    }

    pub fn note_progress(&mut self) {
        self.network_retries_left = self.network_budget;
        self.media_recoveries_left = self.media_budget;
    }

    pub fn live_sync_position(&self) -> Option<f64> {
        self.backend.live_sync_position()
    }

    fn restart_load(&mut self, details: &str) -> EngineOutcome {
        if self.network_retries_left == 0 {
            tracing::warn!(details, "Manifest network retries exhausted");
            return EngineOutcome::Escalate(ErrorRecord::new(
                ErrorKind::NetworkTransient,
                "Network error - check your connection",
            ));
        }
        self.network_retries_left -= 1;
        tracing::warn!(
            details,
            retries_left = self.network_retries_left,
            "Manifest network error, restarting load"
        );
        self.backend.start_load();
        EngineOutcome::Absorbed
    }

    fn recover_media(&mut self, details: &str) -> EngineOutcome {
        if self.media_recoveries_left == 0 {
            tracing::error!(details, "Media error after recovery");
            return EngineOutcome::Escalate(ErrorRecord::new(
                ErrorKind::MediaDecodeRecoverable,
                format!("Stream error: {}", details),
            ));
        }
        self.media_recoveries_left -= 1;
        tracing::warn!(details, "Manifest media error, recovering");
        self.backend.recover_media_error();
        EngineOutcome::Absorbed
    }
}
