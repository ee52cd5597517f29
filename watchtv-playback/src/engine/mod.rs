//! Engine adapters
//!
//! Three decode pathways behind one attach/detach/event contract:
//! - [`NativeEngine`]: hands the URL to the sink's built-in decoder
//! - [`ManifestEngine`]: supervises an adaptive-manifest (HLS) backend
//! - [`TransportStreamEngine`]: supervises an MPEG-TS demuxer backend
//!
//! The manifest and transport-stream backends are platform libraries
//! supplied through an [`EngineProvider`]. The adapters own their retry and
//! recovery policy; the backends only do the work.

pub mod manifest;
pub mod native;
pub mod transport;

pub use manifest::{ManifestBackend, ManifestEngine, ManifestEngineConfig, ManifestError, ManifestErrorType};
pub use native::NativeEngine;
pub use transport::{SeekType, TransportStreamBackend, TransportStreamConfig, TransportStreamEngine};

use serde::Serialize;
use std::fmt;

use crate::classifier::FormatHypothesis;
use crate::config::PlayerConfig;
use crate::error::{ErrorKind, ErrorRecord};
use crate::orchestrator::{Input, Notifier};
use crate::sink::{MediaErrorCode, MediaSink};
use crate::source::SourceReference;

/// Identity of one engine attachment. Signals from a detached session are
/// recognised by a stale id and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Which adapter a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Native,
    Manifest,
    TransportStream,
}

/// Signals raised by engine backends.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    /// The manifest was fetched and parsed
    ManifestParsed,
    /// Error reported by the manifest backend
    ManifestError(ManifestError),
    /// Error reported by the transport-stream demuxer
    DemuxError { kind: String, detail: String },
}

/// How an adapter disposed of a signal or sink error.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    /// The engine is ready to play
    Ready,
    /// Handled internally (retry or recovery in progress)
    Absorbed,
    /// Not relevant to this engine
    Ignored,
    /// Retry or recovery is exhausted, or the error is fatal
    Escalate(ErrorRecord),
}

/// Handle given to a backend for reporting signals. Tagged with the session
/// it belongs to.
#[derive(Clone)]
pub struct EngineEvents {
    session: SessionId,
    notifier: Notifier,
}

impl EngineEvents {
    pub(crate) fn new(session: SessionId, notifier: Notifier) -> Self {
        Self { session, notifier }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn emit(&self, signal: EngineSignal) {
        (self.notifier)(Input::Engine {
            session: self.session,
            signal,
        });
    }
}

impl fmt::Debug for EngineEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEvents")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Factory for the platform's engine backends. Returning `None` means the
/// platform has no such engine.
pub trait EngineProvider: Send {
    fn manifest_engine(
        &mut self,
        config: &ManifestEngineConfig,
        events: EngineEvents,
    ) -> Option<Box<dyn ManifestBackend>>;

    fn transport_stream_engine(
        &mut self,
        config: &TransportStreamConfig,
        events: EngineEvents,
    ) -> Option<Box<dyn TransportStreamBackend>>;
}

/// Provider for platforms that only have the sink's built-in decoder.
#[derive(Debug, Default)]
pub struct NativeOnly;

impl EngineProvider for NativeOnly {
    fn manifest_engine(
        &mut self,
        _config: &ManifestEngineConfig,
        _events: EngineEvents,
    ) -> Option<Box<dyn ManifestBackend>> {
        None
    }

    fn transport_stream_engine(
        &mut self,
        _config: &TransportStreamConfig,
        _events: EngineEvents,
    ) -> Option<Box<dyn TransportStreamBackend>> {
        None
    }
}

/// The live binding between one adapter and the sink.
pub enum EngineSession {
    Native(NativeEngine),
    Manifest(ManifestEngine),
    TransportStream(TransportStreamEngine),
}

impl EngineSession {
    /// Build the adapter for a hypothesis. The returned session is not yet
    /// attached.
    pub fn open(
        hypothesis: FormatHypothesis,
        source: &SourceReference,
        provider: &mut dyn EngineProvider,
        sink: &dyn MediaSink,
        events: EngineEvents,
        config: &PlayerConfig,
    ) -> Result<Self, ErrorRecord> {
        let url = source.uri();
        match hypothesis {
            FormatHypothesis::NativePlayable => Ok(Self::native(url, config)),
            FormatHypothesis::AdaptiveManifest => {
                let engine_config =
                    ManifestEngineConfig::for_source(url, source.is_live(), &config.manifest);
                match provider.manifest_engine(&engine_config, events) {
                    Some(backend) => Ok(Self::Manifest(ManifestEngine::new(
                        backend,
                        engine_config,
                        &config.retry,
                    ))),
                    None if sink.supports_native_manifest() => {
                        tracing::debug!("No manifest engine, using native manifest support");
                        Ok(Self::native(url, config))
                    }
                    None => Err(ErrorRecord::new(
                        ErrorKind::FormatUnsupported,
                        "Adaptive streaming is not supported on this device",
                    )),
                }
            }
            FormatHypothesis::TransportStream { origin } => {
                let engine_config = TransportStreamConfig::for_origin(origin, url, source.is_live());
                match provider.transport_stream_engine(&engine_config, events) {
                    Some(backend) => Ok(Self::TransportStream(TransportStreamEngine::new(
                        backend,
                        engine_config,
                        &config.retry,
                    ))),
                    None => Err(ErrorRecord::new(
                        ErrorKind::FormatUnsupported,
                        "MPEG-TS playback is not supported on this device",
                    )),
                }
            }
            FormatHypothesis::UnsupportedContainer | FormatHypothesis::Undetermined => {
                Err(ErrorRecord::new(
                    ErrorKind::FormatUnsupported,
                    "Video format not supported",
                ))
            }
        }
    }

    /// Native pass-through for a URL known to be playable.
    pub fn native(url: &str, config: &PlayerConfig) -> Self {
        Self::Native(NativeEngine::new(url, &config.retry))
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            Self::Native(_) => EngineKind::Native,
            Self::Manifest(_) => EngineKind::Manifest,
            Self::TransportStream(_) => EngineKind::TransportStream,
        }
    }

    pub fn attach(&mut self, sink: &mut dyn MediaSink) {
        match self {
            Self::Native(engine) => engine.attach(sink),
            Self::Manifest(engine) => engine.attach(sink),
            Self::TransportStream(engine) => engine.attach(sink),
        }
    }

    /// Release the backend and the sink's source. Consumes the session so
    /// nothing can touch it afterwards.
    pub fn detach(self, sink: &mut dyn MediaSink) {
        match self {
            Self::Native(engine) => engine.detach(sink),
            Self::Manifest(engine) => engine.detach(sink),
            Self::TransportStream(engine) => engine.detach(sink),
        }
    }

    pub fn on_signal(&mut self, signal: EngineSignal) -> EngineOutcome {
        match self {
            Self::Native(_) => EngineOutcome::Ignored,
            Self::Manifest(engine) => engine.on_signal(signal),
            Self::TransportStream(engine) => engine.on_signal(signal),
        }
    }

    pub fn on_sink_error(&mut self, code: MediaErrorCode, sink: &mut dyn MediaSink) -> EngineOutcome {
        if code == MediaErrorCode::Aborted {
            return EngineOutcome::Ignored;
        }
        match self {
            Self::Native(engine) => engine.on_sink_error(code, sink),
            Self::Manifest(engine) => engine.on_sink_error(code),
            Self::TransportStream(engine) => engine.on_sink_error(code),
        }
    }

    /// Playback advanced; retry budgets start over.
    pub fn note_progress(&mut self) {
        match self {
            Self::Native(engine) => engine.note_progress(),
            Self::Manifest(engine) => engine.note_progress(),
            Self::TransportStream(engine) => engine.note_progress(),
        }
    }

    /// The manifest engine's own idea of the live position.
    pub fn live_sync_position(&self) -> Option<f64> {
        match self {
            Self::Manifest(engine) => engine.live_sync_position(),
            _ => None,
        }
    }
}

impl fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineSession::{:?}", self.kind())
    }
}

/// Escalation for a sink decode or format error.
pub(crate) fn sink_failure(code: MediaErrorCode) -> ErrorRecord {
    let kind = match code {
        MediaErrorCode::Aborted => ErrorKind::Aborted,
        MediaErrorCode::Network => ErrorKind::NetworkTransient,
        MediaErrorCode::Decode => ErrorKind::EngineFatal,
        MediaErrorCode::SrcNotSupported => ErrorKind::FormatUnsupported,
    };
    ErrorRecord::new(kind, code.message())
}
