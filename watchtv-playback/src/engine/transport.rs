//! Transport-stream engine
//!
//! Supervises an MPEG-TS demuxer. Tuning depends on how the stream was
//! classified: known live segment paths get the low-latency profile,
//! uncertain provider URLs get the resilient one. Sink network errors reload
//! the demuxer within the retry budget; every demux error is fatal for this
//! engine.

use serde::Serialize;
use std::time::Duration;

use crate::classifier::TransportOrigin;
use crate::config::RetryConfig;
use crate::error::{ErrorKind, ErrorRecord};
use crate::sink::{MediaErrorCode, MediaSink};

use super::{sink_failure, EngineOutcome, EngineSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekType {
    /// HTTP range requests
    Range,
    /// Query parameter based seeking
    Param,
}

/// Settings handed to the demuxer backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportStreamConfig {
    pub url: String,
    pub is_live: bool,
    pub enable_worker: bool,
    pub enable_stash_buffer: bool,
    /// Initial stash buffer size in bytes
    pub stash_initial_size: usize,
    pub live_latency_chasing: bool,
    pub live_max_latency: Duration,
    pub live_min_remain: Duration,
    pub auto_cleanup_source_buffer: bool,
    pub max_backward_duration: Duration,
    pub min_backward_duration: Duration,
    pub seek_type: SeekType,
    pub lazy_load_max_duration: Duration,
    pub lazy_load_recover_duration: Duration,
}

impl TransportStreamConfig {
    pub fn for_origin(origin: TransportOrigin, url: &str, is_live: bool) -> Self {
        match origin {
            TransportOrigin::SegmentPath => Self::low_latency(url, is_live),
            TransportOrigin::ProviderPath => Self::resilient(url, is_live),
        }
    }

    /// Small stash, tight latency chasing, aggressive back-buffer cleanup.
    pub fn low_latency(url: &str, is_live: bool) -> Self {
        Self {
            stash_initial_size: 128 * 1024,
            live_max_latency: Duration::from_secs(3),
            live_min_remain: Duration::from_millis(500),
            max_backward_duration: Duration::from_secs(30),
            min_backward_duration: Duration::from_secs(15),
            ..Self::base(url, is_live)
        }
    }

    /// Larger stash and more backward buffer for streams of uncertain shape.
    pub fn resilient(url: &str, is_live: bool) -> Self {
        Self {
            stash_initial_size: 384 * 1024,
            live_max_latency: Duration::from_secs(5),
            live_min_remain: Duration::from_secs(1),
            max_backward_duration: Duration::from_secs(60),
            min_backward_duration: Duration::from_secs(30),
            ..Self::base(url, is_live)
        }
    }

    fn base(url: &str, is_live: bool) -> Self {
        Self {
            url: url.to_string(),
            is_live,
            enable_worker: true,
            enable_stash_buffer: true,
            stash_initial_size: 384 * 1024,
            live_latency_chasing: true,
            live_max_latency: Duration::from_secs(5),
            live_min_remain: Duration::from_secs(1),
            auto_cleanup_source_buffer: true,
            max_backward_duration: Duration::from_secs(60),
            min_backward_duration: Duration::from_secs(30),
            seek_type: SeekType::Range,
            lazy_load_max_duration: Duration::from_secs(180),
            lazy_load_recover_duration: Duration::from_secs(30),
        }
    }
}

/// Platform MPEG-TS demuxer.
pub trait TransportStreamBackend: Send {
    fn attach(&mut self, sink: &mut dyn MediaSink);

    fn load(&mut self);

    fn unload(&mut self);

    fn detach(&mut self);

    /// Release workers and buffers.
    fn destroy(&mut self);
}

pub struct TransportStreamEngine {
    backend: Box<dyn TransportStreamBackend>,
    config: TransportStreamConfig,
    network_budget: u32,
    network_retries_left: u32,
}

impl TransportStreamEngine {
    pub fn new(backend: Box<dyn TransportStreamBackend>, config: TransportStreamConfig, retry: &RetryConfig) -> Self {
        Self {
            backend,
            config,
            network_budget: retry.network_retry_budget,
            network_retries_left: retry.network_retry_budget,
        }
    }

    pub fn config(&self) -> &TransportStreamConfig {
        &self.config
    }

    pub fn attach(&mut self, sink: &mut dyn MediaSink) {
        tracing::info!(
            url = %self.config.url,
            stash = self.config.stash_initial_size,
            "Attaching transport-stream engine"
        );
        self.backend.attach(sink);
        self.backend.load();
    }

    pub fn detach(mut self, sink: &mut dyn MediaSink) {
        tracing::debug!(url = %self.config.url, "Destroying transport-stream engine");
        self.backend.unload();
        self.backend.detach();
        self.backend.destroy();
        sink.clear_source();
    }

    pub fn on_signal(&mut self, signal: EngineSignal) -> EngineOutcome {
        match signal {
            EngineSignal::DemuxError { kind, detail } => {
                tracing::error!(kind = %kind, detail = %detail, "Demux error");
                EngineOutcome::Escalate(ErrorRecord::new(
                    ErrorKind::EngineFatal,
                    format!("Stream error: {}", detail),
                ))
            }
            _ => EngineOutcome::Ignored,
        }
    }

    pub fn on_sink_error(&mut self, code: MediaErrorCode) -> EngineOutcome {
        match code {
            MediaErrorCode::Network if self.network_retries_left > 0 => {
                self.network_retries_left -= 1;
                tracing::warn!(
                    url = %self.config.url,
                    retries_left = self.network_retries_left,
                    "Network error, reloading demuxer"
                );
                self.backend.unload();
                self.backend.load();
                EngineOutcome::Absorbed
            }
            MediaErrorCode::Network => {
                tracing::warn!(url = %self.config.url, "Transport-stream network retries exhausted");
                EngineOutcome::Escalate(ErrorRecord::new(
                    ErrorKind::NetworkTransient,
                    MediaErrorCode::Network.message(),
                ))
            }
            other => EngineOutcome::Escalate(sink_failure(other)),
        }
    }

    pub fn note_progress(&mut self) {
        self.network_retries_left = self.network_budget;
    }
}
