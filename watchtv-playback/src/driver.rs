//! Tokio task owning an [`Orchestrator`].
//!
//! Platform code, engine backends and the transcode worker all feed inputs
//! into one channel; the task applies them in arrival order, so the
//! orchestrator never sees two mutations at once.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::bridge::{TokioTranscodeBridge, Transcoder};
use crate::config::PlayerConfig;
use crate::engine::EngineProvider;
use crate::orchestrator::{Input, Notifier, Orchestrator, PlayerStatus};
use crate::sink::{MediaSink, SinkEvent};
use crate::source::SourceReference;
use crate::view_state::{LastViewed, ViewStateStore};

/// Cloneable front end of a running player. The player stops, and releases
/// its engine and transcode session, once every handle is dropped.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<Input>,
    status: watch::Receiver<PlayerStatus>,
    restored: Option<LastViewed>,
}

impl PlayerHandle {
    /// Queue an input. Returns false if the player has stopped.
    pub fn send(&self, input: Input) -> bool {
        self.tx.send(input).is_ok()
    }

    pub fn set_source(&self, source: SourceReference) -> bool {
        self.send(Input::SetSource(source))
    }

    pub fn retry(&self) -> bool {
        self.send(Input::Retry)
    }

    pub fn play(&self) -> bool {
        self.send(Input::Play)
    }

    pub fn pause(&self) -> bool {
        self.send(Input::Pause)
    }

    pub fn toggle_play(&self) -> bool {
        self.send(Input::TogglePlay)
    }

    pub fn seek(&self, position: f64) -> bool {
        self.send(Input::Seek(position))
    }

    pub fn set_volume(&self, volume: f64) -> bool {
        self.send(Input::SetVolume(volume))
    }

    pub fn set_muted(&self, muted: bool) -> bool {
        self.send(Input::SetMuted(muted))
    }

    pub fn toggle_mute(&self) -> bool {
        self.send(Input::ToggleMute)
    }

    pub fn teardown(&self) -> bool {
        self.send(Input::Teardown)
    }

    /// Forward a sink lifecycle event.
    pub fn sink_event(&self, event: SinkEvent) -> bool {
        self.send(Input::Sink(event))
    }

    /// Latest published status.
    pub fn status(&self) -> PlayerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerStatus> {
        self.status.clone()
    }

    /// Selection persisted by the previous run, read at startup.
    pub fn restored_view(&self) -> Option<&LastViewed> {
        self.restored.as_ref()
    }
}

/// Notifier feeding the player channel. Holds the sender weakly so that
/// engines and the transcode worker do not keep a dropped player alive.
fn channel_notifier(tx: &mpsc::UnboundedSender<Input>) -> Notifier {
    let weak = tx.downgrade();
    Arc::new(move |input| {
        if let Some(tx) = weak.upgrade() {
            let _ = tx.send(input);
        }
    })
}

/// Start a player on the current tokio runtime.
pub fn spawn_player<T: Transcoder>(
    config: PlayerConfig,
    sink: Box<dyn MediaSink>,
    provider: Box<dyn EngineProvider>,
    transcoder: T,
    store: Option<Box<dyn ViewStateStore>>,
) -> (PlayerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let notifier = channel_notifier(&tx);
    let bridge = TokioTranscodeBridge::spawn(transcoder, Arc::clone(&notifier));

    let mut orchestrator = Orchestrator::new(config, sink, provider, Box::new(bridge), notifier);
    if let Some(store) = store {
        orchestrator = orchestrator.with_view_store(store);
    }

    let restored = orchestrator.restore_view_state();
    if let Some(view) = &restored {
        tracing::info!(playlist = %view.playlist_id, "Restored last viewed selection");
    }

    let handle = PlayerHandle {
        tx,
        status: orchestrator.subscribe(),
        restored,
    };
    let task = tokio::spawn(run_player(orchestrator, rx));
    (handle, task)
}

async fn run_player(mut orchestrator: Orchestrator, mut rx: mpsc::UnboundedReceiver<Input>) {
    while let Some(input) = rx.recv().await {
        orchestrator.dispatch(input);
    }
    orchestrator.dispatch(Input::Teardown);
    tracing::debug!("Player stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PlaybackState;
    use crate::tests::fakes::{FakeProvider, FakeSink, FakeTranscoder};
    use crate::view_state::{ContentKind, MemoryStore};
    use std::time::Duration;

    async fn wait_for<F>(rx: &mut watch::Receiver<PlayerStatus>, pred: F) -> PlayerStatus
    where
        F: Fn(&PlayerStatus) -> bool,
    {
        let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
            .await
            .expect("timed out waiting for status")
            .expect("player stopped");
        status.clone()
    }

    #[tokio::test]
    async fn test_unsupported_container_plays_transcoded_url() {
        let sink = FakeSink::new();
        let probe = sink.probe();
        let transcoder = FakeTranscoder::succeeding("http://127.0.0.1:3000/transcode/abc/stream.m3u8");
        let calls = transcoder.calls();

        let (player, _task) = spawn_player(
            PlayerConfig::default(),
            Box::new(sink),
            Box::new(FakeProvider::new()),
            transcoder,
            None,
        );
        let mut rx = player.subscribe();

        player.set_source(SourceReference::on_demand("file:///movies/film.mkv"));
        let status = wait_for(&mut rx, |s| s.transcode_url.is_some()).await;

        assert_eq!(status.state, PlaybackState::Loading);
        assert!(calls.lock().contains(&"start:/movies/film.mkv".to_string()));
        assert_eq!(
            probe.current_source().as_deref(),
            Some("http://127.0.0.1:3000/transcode/abc/stream.m3u8")
        );
    }

    #[tokio::test]
    async fn test_transcode_failure_surfaces_error() {
        let (player, _task) = spawn_player(
            PlayerConfig::default(),
            Box::new(FakeSink::new()),
            Box::new(FakeProvider::new()),
            FakeTranscoder::failing("ffmpeg not found"),
            None,
        );
        let mut rx = player.subscribe();

        player.set_source(SourceReference::on_demand("/movies/film.avi"));
        let status = wait_for(&mut rx, |s| s.error().is_some()).await;

        let err = status.error().unwrap();
        assert!(err.detail.starts_with("Transcode failed: "));
        assert!(err.detail.contains("ffmpeg not found"));
        assert!(!status.loading);
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_transcoder() {
        let transcoder = FakeTranscoder::succeeding("http://127.0.0.1:3000/transcode/x/stream.m3u8");
        let calls = transcoder.calls();
        let (player, task) = spawn_player(
            PlayerConfig::default(),
            Box::new(FakeSink::new()),
            Box::new(FakeProvider::new()),
            transcoder,
            None,
        );

        player.set_source(SourceReference::live("http://example.com/live/1.m3u8"));
        drop(player);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("player did not stop")
            .unwrap();

        for _ in 0..50 {
            if calls.lock().iter().filter(|c| *c == "stop").count() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // one stop for the selection, one for the final teardown
        assert!(calls.lock().iter().filter(|c| *c == "stop").count() >= 2);
    }

    #[tokio::test]
    async fn test_restores_view_state() {
        let store = MemoryStore::new();
        store
            .save(&LastViewed {
                playlist_id: "pl-7".to_string(),
                channel_id: Some("ch-1".to_string()),
                category_id: None,
                content_type: ContentKind::Live,
            })
            .unwrap();

        let (player, _task) = spawn_player(
            PlayerConfig::default(),
            Box::new(FakeSink::new()),
            Box::new(FakeProvider::new()),
            FakeTranscoder::failing("unused"),
            Some(Box::new(store)),
        );

        let view = player.restored_view().unwrap();
        assert_eq!(view.playlist_id, "pl-7");
        assert_eq!(player.status().state, PlaybackState::Idle);
    }
}
