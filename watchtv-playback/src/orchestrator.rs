//! Playback orchestrator
//!
//! Explicit state machine driving classification, engine attachment,
//! supervision and the transcode fallback. Every mutation enters through
//! [`Orchestrator::dispatch`]; observers read [`PlayerStatus`] snapshots from
//! a watch channel.
//!
//! Invariants:
//! - at most one engine session is attached to the sink
//! - at most one transcode request is pending
//! - replacing the source detaches the engine and stops the transcoder
//!   before anything new is created
//! - results of async work started for an earlier source are discarded
//!   (engine signals by session id, transcode results by ticket)

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::bridge::{TranscodeBridge, TranscodeTicket};
use crate::classifier::{classify, FormatHypothesis};
use crate::config::PlayerConfig;
use crate::engine::{EngineEvents, EngineKind, EngineOutcome, EngineProvider, EngineSession, EngineSignal, SessionId};
use crate::error::{ErrorKind, ErrorRecord, FailureAffordance};
use crate::live_edge::live_edge_target;
use crate::sink::{MediaErrorCode, MediaSink, SinkEvent};
use crate::source::{ChannelInfo, SourceReference};
use crate::view_state::{LastViewed, ViewStateStore};

/// Delivers asynchronous inputs (engine signals, transcode results) back to
/// whoever owns the orchestrator.
pub type Notifier = Arc<dyn Fn(Input) + Send + Sync>;

/// Everything the orchestrator reacts to.
#[derive(Debug, Clone)]
pub enum Input {
    /// Play a new selection
    SetSource(SourceReference),
    /// Try the current selection again from scratch
    Retry,
    Play,
    Pause,
    TogglePlay,
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
    ToggleMute,
    /// Release everything; the view is gone
    Teardown,
    Sink(SinkEvent),
    Engine {
        session: SessionId,
        signal: EngineSignal,
    },
    TranscodeFinished {
        ticket: TranscodeTicket,
        result: Result<String, String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Error(ErrorRecord),
    Transcoding,
}

/// Snapshot published to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    /// Show the loading indicator
    pub loading: bool,
    pub playing: bool,
    /// The selected source uri
    pub source: Option<String>,
    pub channel: Option<ChannelInfo>,
    pub is_live: bool,
    pub engine: Option<EngineKind>,
    /// Playable URL issued by the transcoder for the current selection
    pub transcode_url: Option<String>,
    pub position: f64,
    pub duration: Option<f64>,
    pub buffered_end: Option<f64>,
    pub volume: f64,
    pub muted: bool,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            loading: false,
            playing: false,
            source: None,
            channel: None,
            is_live: false,
            engine: None,
            transcode_url: None,
            position: 0.0,
            duration: None,
            buffered_end: None,
            volume: 1.0,
            muted: false,
        }
    }
}

impl PlayerStatus {
    pub fn error(&self) -> Option<&ErrorRecord> {
        match &self.state {
            PlaybackState::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn affordance(&self) -> Option<FailureAffordance> {
        self.error().map(ErrorRecord::affordance)
    }

    /// A fresh status for a new selection; transport settings carry over.
    fn for_source(&self, source: &SourceReference) -> Self {
        Self {
            state: PlaybackState::Loading,
            loading: true,
            source: Some(source.uri().to_string()),
            channel: source.channel().cloned(),
            is_live: source.is_live(),
            volume: self.volume,
            muted: self.muted,
            ..Self::default()
        }
    }
}

pub struct Orchestrator {
    config: PlayerConfig,
    sink: Box<dyn MediaSink>,
    provider: Box<dyn EngineProvider>,
    bridge: Box<dyn TranscodeBridge>,
    store: Option<Box<dyn ViewStateStore>>,
    notifier: Notifier,
    status: PlayerStatus,
    status_tx: watch::Sender<PlayerStatus>,
    /// The user's selection
    source: Option<SourceReference>,
    /// What the sink is actually playing (the transcoded URL after fallback)
    effective: Option<SourceReference>,
    engine: Option<(SessionId, EngineSession)>,
    next_session: u64,
    pending_transcode: Option<TranscodeTicket>,
    next_ticket: u64,
    transcode_attempted: bool,
    playback_started: bool,
}

impl Orchestrator {
    pub fn new(
        config: PlayerConfig,
        sink: Box<dyn MediaSink>,
        provider: Box<dyn EngineProvider>,
        bridge: Box<dyn TranscodeBridge>,
        notifier: Notifier,
    ) -> Self {
        let status = PlayerStatus::default();
        let (status_tx, _) = watch::channel(status.clone());
        Self {
            config,
            sink,
            provider,
            bridge,
            store: None,
            notifier,
            status,
            status_tx,
            source: None,
            effective: None,
            engine: None,
            next_session: 0,
            pending_transcode: None,
            next_ticket: 0,
            transcode_attempted: false,
            playback_started: false,
        }
    }

    /// Persist the selection of every source that carries a view context.
    pub fn with_view_store(mut self, store: Box<dyn ViewStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&SourceReference> {
        self.source.as_ref()
    }

    /// Current engine session, if one is attached.
    pub fn session(&self) -> Option<SessionId> {
        self.engine.as_ref().map(|(id, _)| *id)
    }

    pub fn pending_transcode(&self) -> Option<TranscodeTicket> {
        self.pending_transcode
    }

    /// Read the last viewed selection. Absence or a broken store yields
    /// `None`.
    pub fn restore_view_state(&self) -> Option<LastViewed> {
        let store = self.store.as_ref()?;
        match store.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Failed to read view state: {}", e);
                None
            }
        }
    }

    /// The single mutation entry point.
    pub fn dispatch(&mut self, input: Input) {
        match input {
            Input::SetSource(source) => self.select(source, true),
            Input::Retry => self.retry(),
            Input::Play => self.play(),
            Input::Pause => self.pause(),
            Input::TogglePlay => {
                if self.status.playing {
                    self.pause();
                } else {
                    self.play();
                }
            }
            Input::Seek(position) => {
                if self.engine.is_some() {
                    self.sink.seek(position.max(0.0));
                }
            }
            Input::SetVolume(volume) => {
                let volume = volume.clamp(0.0, 1.0);
                self.sink.set_volume(volume);
                self.status.volume = volume;
                self.status.muted = volume == 0.0;
                self.sink.set_muted(self.status.muted);
            }
            Input::SetMuted(muted) => {
                self.sink.set_muted(muted);
                self.status.muted = muted;
            }
            Input::ToggleMute => {
                let muted = !self.status.muted;
                self.sink.set_muted(muted);
                self.status.muted = muted;
            }
            Input::Teardown => self.teardown(),
            Input::Sink(event) => self.on_sink_event(event),
            Input::Engine { session, signal } => self.on_engine_signal(session, signal),
            Input::TranscodeFinished { ticket, result } => self.on_transcode_finished(ticket, result),
        }
        self.publish();
    }

    fn publish(&self) {
        let status = &self.status;
        self.status_tx.send_if_modified(|current| {
            if current == status {
                false
            } else {
                *current = status.clone();
                true
            }
        });
    }

    // ---- selection ------------------------------------------------------

    fn select(&mut self, source: SourceReference, remember: bool) {
        self.release();

        if remember {
            self.remember(&source);
        }

        self.transcode_attempted = false;
        self.playback_started = false;
        self.status = self.status.for_source(&source);
        self.source = Some(source.clone());
        self.effective = Some(source.clone());

        let hypothesis = classify(&source);
        tracing::debug!(uri = %source.uri(), ?hypothesis, "Classified source");

        match hypothesis {
            FormatHypothesis::UnsupportedContainer => {
                tracing::info!(uri = %source.uri(), "Unsupported container, transcoding");
                self.start_transcode();
            }
            FormatHypothesis::Undetermined => {
                self.surface(ErrorRecord::new(ErrorKind::FormatUnsupported, "No stream to play"));
            }
            hypothesis => self.attach(hypothesis, &source),
        }
    }

    fn retry(&mut self) {
        let Some(source) = self.source.clone() else {
            tracing::debug!("Retry without a source");
            return;
        };
        tracing::info!(uri = %source.uri(), "Retrying playback");
        self.select(source, false);
    }

    fn remember(&self, source: &SourceReference) {
        if let (Some(store), Some(view)) = (self.store.as_ref(), source.view_context()) {
            if let Err(e) = store.save(view) {
                tracing::warn!("Failed to save view state: {}", e);
            }
        }
    }

    fn teardown(&mut self) {
        tracing::debug!("Tearing down player");
        self.release();
        self.source = None;
        self.effective = None;
        self.transcode_attempted = false;
        self.playback_started = false;
        self.status = PlayerStatus {
            volume: self.status.volume,
            muted: self.status.muted,
            ..PlayerStatus::default()
        };
    }

    /// Detach the engine and stop the transcoder. The stop is issued even
    /// when no session is believed active.
    fn release(&mut self) {
        self.detach_engine();
        if let Some(ticket) = self.pending_transcode.take() {
            tracing::debug!(%ticket, "Superseding pending transcode");
        }
        self.bridge.stop();
    }

    // ---- engines --------------------------------------------------------

    fn attach(&mut self, hypothesis: FormatHypothesis, source: &SourceReference) {
        debug_assert!(self.engine.is_none(), "engine attached twice");
        let id = self.next_session_id();
        let events = EngineEvents::new(id, Arc::clone(&self.notifier));

        let opened = EngineSession::open(
            hypothesis,
            source,
            self.provider.as_mut(),
            self.sink.as_ref(),
            events,
            &self.config,
        );

        match opened {
            Ok(session) => self.install(id, session),
            Err(err) => self.fail(err),
        }
    }

    fn install(&mut self, id: SessionId, mut session: EngineSession) {
        session.attach(self.sink.as_mut());
        tracing::debug!(session = %id, kind = ?session.kind(), "Engine attached");
        self.status.engine = Some(session.kind());
        self.engine = Some((id, session));
    }

    fn detach_engine(&mut self) {
        if let Some((id, session)) = self.engine.take() {
            tracing::debug!(session = %id, kind = ?session.kind(), "Detaching engine");
            session.detach(self.sink.as_mut());
        }
        self.status.engine = None;
    }

    fn next_session_id(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    fn on_engine_signal(&mut self, session: SessionId, signal: EngineSignal) {
        let outcome = match self.engine.as_mut() {
            Some((id, engine)) if *id == session => engine.on_signal(signal),
            _ => {
                tracing::debug!(session = %session, ?signal, "Discarding signal from stale engine");
                return;
            }
        };
        self.apply(outcome);
    }

    fn apply(&mut self, outcome: EngineOutcome) {
        match outcome {
            EngineOutcome::Ready => self.mark_ready(),
            EngineOutcome::Absorbed | EngineOutcome::Ignored => {}
            EngineOutcome::Escalate(err) => self.fail(err),
        }
    }

    // ---- sink -----------------------------------------------------------

    fn on_sink_event(&mut self, event: SinkEvent) {
        if self.engine.is_none() {
            tracing::trace!(?event, "Ignoring sink event without an engine");
            return;
        }

        match event {
            SinkEvent::LoadedData => {
                self.mark_started();
                self.mark_ready();
            }
            SinkEvent::CanPlay => self.mark_ready(),
            SinkEvent::Play => self.seek_to_live(),
            SinkEvent::Playing => {
                self.mark_started();
                self.status.state = PlaybackState::Playing;
                self.status.playing = true;
            }
            SinkEvent::Pause => {
                self.status.playing = false;
                if self.status.state == PlaybackState::Playing {
                    self.status.state = PlaybackState::Ready;
                }
            }
            SinkEvent::Waiting => {
                if !self.playback_started {
                    self.status.loading = true;
                }
            }
            SinkEvent::TimeUpdate {
                position,
                buffered_end,
            } => {
                self.status.position = position;
                self.status.buffered_end = buffered_end;
                if position > 0.0 {
                    self.mark_started();
                    if let Some((_, engine)) = self.engine.as_mut() {
                        engine.note_progress();
                    }
                }
            }
            SinkEvent::DurationChange(duration) => {
                if duration.is_finite() {
                    self.status.duration = Some(duration);
                }
            }
            SinkEvent::Error(code) => self.on_sink_error(code),
        }
    }

    fn on_sink_error(&mut self, code: MediaErrorCode) {
        let Some((_, engine)) = self.engine.as_mut() else {
            return;
        };
        tracing::debug!(?code, "Sink error");
        let outcome = engine.on_sink_error(code, self.sink.as_mut());
        self.apply(outcome);
    }

    fn mark_ready(&mut self) {
        if self.status.state == PlaybackState::Loading {
            self.status.state = PlaybackState::Ready;
        }
        self.status.loading = false;
    }

    /// Real playback has begun; the loading indicator stays off for the rest
    /// of this source.
    fn mark_started(&mut self) {
        self.playback_started = true;
        self.status.loading = false;
    }

    // ---- transport ------------------------------------------------------

    fn play(&mut self) {
        if self.engine.is_none() {
            tracing::debug!("Play without an engine");
            return;
        }
        self.seek_to_live();
        self.sink.play();
    }

    fn pause(&mut self) {
        if self.engine.is_some() {
            self.sink.pause();
        }
    }

    fn seek_to_live(&mut self) {
        let live = self.effective.as_ref().is_some_and(SourceReference::is_live);
        if !live {
            return;
        }
        let hint = self
            .engine
            .as_ref()
            .and_then(|(_, engine)| engine.live_sync_position());
        let timing = self.sink.timing();
        if let Some(target) = live_edge_target(hint, &timing, &self.config.live_edge) {
            tracing::debug!(tier = ?target.tier, position = target.position, "Seeking to live edge");
            self.sink.seek(target.position);
        }
    }

    // ---- failure and transcoding ----------------------------------------

    /// The fallback rule: try transcoding once per source before giving up.
    fn fail(&mut self, err: ErrorRecord) {
        if err.kind == ErrorKind::Aborted {
            tracing::debug!(detail = %err.detail, "Playback aborted");
            return;
        }

        self.detach_engine();

        if err.wants_transcode() {
            if !self.transcode_attempted {
                tracing::info!(detail = %err.detail, "Playback failed, falling back to transcode");
                self.start_transcode();
                return;
            }
            self.surface(ErrorRecord::new(
                ErrorKind::TranscodeUnavailable,
                format!("{}. Try opening it in an external player.", err.detail),
            ));
            return;
        }

        self.surface(err);
    }

    fn surface(&mut self, err: ErrorRecord) {
        tracing::warn!(kind = ?err.kind, detail = %err.detail, "Playback error");
        self.status.state = PlaybackState::Error(err);
        self.status.loading = false;
        self.status.playing = false;
    }

    fn start_transcode(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        let path = source.transcode_input().to_string();

        self.next_ticket += 1;
        let ticket = TranscodeTicket(self.next_ticket);
        self.transcode_attempted = true;
        self.pending_transcode = Some(ticket);
        self.status.state = PlaybackState::Transcoding;
        self.status.loading = true;
        self.status.playing = false;

        tracing::info!(%ticket, source = %path, "Requesting transcode");
        self.bridge.start(ticket, &path);
    }

    fn on_transcode_finished(&mut self, ticket: TranscodeTicket, result: Result<String, String>) {
        if self.pending_transcode != Some(ticket) {
            tracing::debug!(%ticket, "Discarding stale transcode result");
            return;
        }
        self.pending_transcode = None;

        let url = match result {
            Ok(url) => url,
            Err(reason) => {
                self.surface(ErrorRecord::new(
                    ErrorKind::TranscodeUnavailable,
                    format!(
                        "Transcode failed: {}. Make sure FFmpeg is installed, or open the stream in an external player.",
                        reason
                    ),
                ));
                return;
            }
        };

        let Some(source) = self.source.as_ref() else {
            return;
        };
        tracing::info!(%ticket, url = %url, "Transcode ready");

        let effective = source.redirected(url.clone());
        self.playback_started = false;
        self.status.transcode_url = Some(url.clone());
        self.status.state = PlaybackState::Loading;
        self.status.loading = true;
        self.effective = Some(effective);

        let id = self.next_session_id();
        let session = EngineSession::native(&url, &self.config);
        self.install(id, session);
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.release();
    }
}
