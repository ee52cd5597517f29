//! End-to-end orchestrator scenarios against the fakes.

use crate::bridge::TranscodeTicket;
use crate::config::PlayerConfig;
use crate::engine::manifest::{ManifestError, ManifestErrorType};
use crate::engine::{EngineKind, EngineSignal};
use crate::error::{ErrorKind, FailureAffordance};
use crate::orchestrator::{Input, PlaybackState};
use crate::sink::{MediaErrorCode, SinkEvent, SinkTiming};
use crate::source::{ChannelInfo, SourceReference};
use crate::tests::fakes::{FakeProvider, FakeSink, Harness};
use crate::view_state::{ContentKind, JsonFileStore, LastViewed, ViewStateStore};

const TRANSCODED: &str = "http://127.0.0.1:3000/transcode/s1/stream.m3u8";

fn demux_failure() -> EngineSignal {
    EngineSignal::DemuxError {
        kind: "MediaError".to_string(),
        detail: "unsupported codec".to_string(),
    }
}

#[test]
fn test_local_mkv_goes_straight_to_transcoding() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("file:///movies/x.mkv"));

    assert_eq!(h.status().state, PlaybackState::Transcoding);
    assert!(h.status().loading);
    assert_eq!(h.orchestrator.session(), None);
    assert_eq!(h.engines.created(), 0);
    assert!(h.sink.calls().is_empty());
    assert_eq!(
        h.bridge.calls(),
        vec!["stop".to_string(), "start:1:/movies/x.mkv".to_string()]
    );
}

#[test]
fn test_provider_stream_falls_back_to_transcode_once() {
    let uri = "http://host/live/u/p/123";
    let mut h = Harness::new();
    h.set_source(SourceReference::live(uri).with_channel(ChannelInfo::from_name("News (720p)")));

    assert_eq!(h.status().engine, Some(EngineKind::TransportStream));
    assert_eq!(h.engines.transport_configs()[0].stash_initial_size, 384 * 1024);
    assert_eq!(h.engines.live(), 1);

    h.emit(demux_failure());
    assert_eq!(h.engines.live(), 0);
    assert_eq!(h.bridge.starts(), 1);
    assert_eq!(h.bridge.last_start().unwrap().1, uri);
    assert_eq!(h.status().state, PlaybackState::Transcoding);

    h.finish_transcode(Ok(TRANSCODED));
    assert_eq!(h.sink.current_source().as_deref(), Some(TRANSCODED));
    assert_eq!(h.status().engine, Some(EngineKind::Native));
    assert_eq!(h.status().transcode_url.as_deref(), Some(TRANSCODED));
    assert_eq!(h.status().state, PlaybackState::Loading);
    assert_eq!(h.status().channel.as_ref().unwrap().quality.as_deref(), Some("720p"));

    // The transcoded stream fails too: no second transcode.
    h.sink_event(SinkEvent::Error(MediaErrorCode::Decode));
    assert_eq!(h.bridge.starts(), 1);
    let err = h.status().error().unwrap();
    assert_eq!(err.kind, ErrorKind::TranscodeUnavailable);
    assert_eq!(h.status().affordance(), Some(FailureAffordance::ExternalPlayer));
    assert!(!h.status().loading);
}

#[test]
fn test_segment_stream_uses_low_latency_profile() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("http://host/hls/stream.ts"));

    let configs = h.engines.transport_configs();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].stash_initial_size, 128 * 1024);
    assert!(configs[0].is_live);
    assert_eq!(h.engines.calls(), vec!["ts.attach".to_string(), "ts.load".to_string()]);
}

#[test]
fn test_missing_transport_engine_transcodes() {
    let mut h = Harness::build(
        PlayerConfig::default(),
        FakeSink::new(),
        FakeProvider::new().without_transport(),
    );
    h.set_source(SourceReference::live("http://host/hls/stream.ts"));

    assert_eq!(h.status().state, PlaybackState::Transcoding);
    assert_eq!(h.bridge.last_start().unwrap().1, "http://host/hls/stream.ts");
}

#[test]
fn test_manifest_network_error_restarts_load() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    assert_eq!(
        h.engines.calls(),
        vec![
            "manifest.load_source:https://host/a.m3u8".to_string(),
            "manifest.attach".to_string()
        ]
    );

    h.emit(EngineSignal::ManifestParsed);
    assert_eq!(h.status().state, PlaybackState::Ready);
    assert!(!h.status().loading);

    h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    assert_eq!(h.engines.count("manifest.start_load"), 1);
    assert_eq!(h.status().state, PlaybackState::Ready);
    assert_eq!(h.engines.live(), 1);
    assert_eq!(h.bridge.starts(), 0);
}

#[test]
fn test_network_budget_exhaustion_offers_retry() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    h.emit(EngineSignal::ManifestParsed);

    for _ in 0..3 {
        h.emit(EngineSignal::ManifestError(ManifestError::fatal(
            ManifestErrorType::Network,
            "fragLoadError",
        )));
    }
    assert_eq!(h.engines.count("manifest.start_load"), 3);
    assert!(h.status().error().is_none());

    h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    let err = h.status().error().unwrap();
    assert_eq!(err.kind, ErrorKind::NetworkTransient);
    assert_eq!(h.status().affordance(), Some(FailureAffordance::Retry));
    assert_eq!(h.engines.live(), 0);
    assert_eq!(h.bridge.starts(), 0);

    let stops = h.bridge.stops();
    h.dispatch(Input::Retry);
    assert_eq!(h.status().state, PlaybackState::Loading);
    assert_eq!(h.engines.created(), 2);
    assert_eq!(h.engines.live(), 1);
    assert_eq!(h.bridge.stops(), stops + 1);
}

#[test]
fn test_progress_resets_network_budget() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    h.emit(EngineSignal::ManifestParsed);

    for _ in 0..3 {
        h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    }
    h.sink_event(SinkEvent::TimeUpdate {
        position: 12.0,
        buffered_end: Some(20.0),
    });
    for _ in 0..3 {
        h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    }

    assert_eq!(h.engines.count("manifest.start_load"), 6);
    assert!(h.status().error().is_none());
}

#[test]
fn test_media_error_recovers_once_then_transcodes() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("https://host/vod/master.m3u8"));
    h.emit(EngineSignal::ManifestParsed);

    let media = || EngineSignal::ManifestError(ManifestError::fatal(ManifestErrorType::Media, "bufferAppendError"));
    h.emit(media());
    assert_eq!(h.engines.count("manifest.recover_media_error"), 1);
    assert_eq!(h.bridge.starts(), 0);

    h.emit(media());
    assert_eq!(h.engines.live(), 0);
    assert_eq!(h.bridge.starts(), 1);
    assert_eq!(h.status().state, PlaybackState::Transcoding);
}

#[test]
fn test_non_fatal_manifest_errors_are_ignored() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    h.emit(EngineSignal::ManifestError(ManifestError {
        kind: ManifestErrorType::Network,
        fatal: false,
        details: "levelLoadTimeOut".to_string(),
    }));

    assert_eq!(h.engines.count("manifest.start_load"), 0);
    assert_eq!(h.status().state, PlaybackState::Loading);
}

#[test]
fn test_native_manifest_support_without_engine() {
    let mut h = Harness::build(
        PlayerConfig::default(),
        FakeSink::new().with_native_manifest(),
        FakeProvider::new().without_manifest(),
    );
    h.set_source(SourceReference::live("https://host/a.m3u8"));

    assert_eq!(h.status().engine, Some(EngineKind::Native));
    assert_eq!(h.sink.current_source().as_deref(), Some("https://host/a.m3u8"));
    assert_eq!(h.sink.count("load"), 1);
}

#[test]
fn test_no_manifest_pathway_transcodes() {
    let mut h = Harness::build(
        PlayerConfig::default(),
        FakeSink::new(),
        FakeProvider::new().without_manifest(),
    );
    h.set_source(SourceReference::live("https://host/a.m3u8"));

    assert_eq!(h.status().state, PlaybackState::Transcoding);
    assert_eq!(h.bridge.starts(), 1);
}

#[test]
fn test_loading_indicator_stays_off_after_playback_starts() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    assert!(h.status().loading);

    h.emit(EngineSignal::ManifestParsed);
    assert!(!h.status().loading);

    // Still waiting for the first frame.
    h.sink_event(SinkEvent::Waiting);
    assert!(h.status().loading);

    h.sink_event(SinkEvent::Playing);
    assert_eq!(h.status().state, PlaybackState::Playing);
    assert!(!h.status().loading);

    h.sink_event(SinkEvent::TimeUpdate {
        position: 5.0,
        buffered_end: Some(8.0),
    });
    h.sink_event(SinkEvent::Waiting);
    assert!(!h.status().loading);
    assert_eq!(h.status().position, 5.0);
}

#[test]
fn test_pause_returns_to_ready() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("http://host/movie.mp4"));
    h.sink_event(SinkEvent::CanPlay);
    h.sink_event(SinkEvent::Playing);
    assert!(h.status().playing);

    h.dispatch(Input::TogglePlay);
    assert_eq!(h.sink.count("pause"), 1);
    h.sink_event(SinkEvent::Pause);
    assert_eq!(h.status().state, PlaybackState::Ready);
    assert!(!h.status().playing);

    h.dispatch(Input::TogglePlay);
    assert_eq!(h.sink.count("play"), 1);
}

#[test]
fn test_superseded_transcode_is_stopped_and_its_result_discarded() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("/media/a.mkv"));
    let (first, _) = h.bridge.last_start().unwrap();

    h.set_source(SourceReference::on_demand("/media/b.avi"));
    let calls = h.bridge.calls();
    assert_eq!(
        calls,
        vec![
            "stop".to_string(),
            "start:1:/media/a.mkv".to_string(),
            "stop".to_string(),
            "start:2:/media/b.avi".to_string(),
        ]
    );

    h.dispatch(Input::TranscodeFinished {
        ticket: first,
        result: Ok(TRANSCODED.to_string()),
    });
    assert_eq!(h.sink.current_source(), None);
    assert_eq!(h.status().state, PlaybackState::Transcoding);
    assert_eq!(h.orchestrator.pending_transcode(), Some(TranscodeTicket(2)));

    h.finish_transcode(Ok(TRANSCODED));
    assert_eq!(h.sink.current_source().as_deref(), Some(TRANSCODED));
    assert_eq!(h.orchestrator.pending_transcode(), None);
}

#[test]
fn test_transcode_failure_message() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("/media/a.wmv"));
    h.finish_transcode(Err("ffmpeg exited with status 1"));

    let err = h.status().error().unwrap();
    assert_eq!(err.kind, ErrorKind::TranscodeUnavailable);
    assert_eq!(
        err.detail,
        "Transcode failed: ffmpeg exited with status 1. Make sure FFmpeg is installed, or open the stream in an external player."
    );
    assert_eq!(h.status().affordance(), Some(FailureAffordance::ExternalPlayer));

    // Retry gets a fresh transcode attempt.
    h.dispatch(Input::Retry);
    assert_eq!(h.bridge.starts(), 2);
    assert_eq!(h.status().state, PlaybackState::Transcoding);
}

#[test]
fn test_double_teardown_is_harmless() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    let stale = h.engines.events(0).unwrap();

    h.dispatch(Input::Teardown);
    h.dispatch(Input::Teardown);
    assert_eq!(h.status().state, PlaybackState::Idle);
    assert_eq!(h.engines.live(), 0);
    assert_eq!(h.bridge.stops(), 3);

    stale.emit(EngineSignal::ManifestParsed);
    h.pump();
    h.sink_event(SinkEvent::Playing);
    h.sink_event(SinkEvent::Error(MediaErrorCode::Decode));
    h.dispatch(Input::Play);
    h.dispatch(Input::Retry);

    assert_eq!(h.status().state, PlaybackState::Idle);
    assert_eq!(h.engines.created(), 1);
    assert_eq!(h.bridge.starts(), 0);
    assert_eq!(h.sink.count("play"), 0);
}

#[test]
fn test_signals_from_replaced_engine_are_discarded() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    let old = h.engines.events(0).unwrap();
    h.set_source(SourceReference::live("https://host/b.m3u8"));

    old.emit(EngineSignal::ManifestError(ManifestError::fatal(
        ManifestErrorType::Other,
        "manifestParsingError",
    )));
    h.pump();

    assert_eq!(h.status().state, PlaybackState::Loading);
    assert_eq!(h.engines.live(), 1);
    assert_eq!(h.bridge.starts(), 0);
    assert_eq!(h.status().source.as_deref(), Some("https://host/b.m3u8"));
}

#[test]
fn test_play_seeks_to_engine_live_position_first() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    h.engines.set_live_sync(Some(42.0));
    h.sink.set_timing(SinkTiming {
        position: 3.0,
        duration: None,
        buffered_end: Some(100.0),
    });
    h.sink.clear();

    h.dispatch(Input::Play);
    assert_eq!(h.sink.calls(), vec!["seek:42".to_string(), "play".to_string()]);
}

#[test]
fn test_live_edge_falls_back_to_buffer_then_duration() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    h.sink.set_timing(SinkTiming {
        position: 3.0,
        duration: Some(600.0),
        buffered_end: Some(100.0),
    });
    h.sink_event(SinkEvent::Play);
    assert_eq!(h.sink.seeks(), vec![99.0]);

    let mut h = Harness::new();
    h.set_source(SourceReference::live("http://host/channel.mp4"));
    h.sink.set_timing(SinkTiming {
        position: 0.0,
        duration: Some(60.0),
        buffered_end: None,
    });
    h.dispatch(Input::Play);
    assert_eq!(h.sink.seeks(), vec![59.5]);
}

#[test]
fn test_on_demand_play_does_not_seek() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("http://host/movie.mp4"));
    h.sink.set_timing(SinkTiming {
        position: 0.0,
        duration: Some(5400.0),
        buffered_end: Some(30.0),
    });
    h.dispatch(Input::Play);
    assert!(h.sink.seeks().is_empty());
    assert_eq!(h.sink.count("play"), 1);
}

#[test]
fn test_aborted_sink_error_is_ignored() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("http://host/movie.mp4"));
    let session = h.orchestrator.session();

    h.sink_event(SinkEvent::Error(MediaErrorCode::Aborted));
    assert_eq!(h.status().state, PlaybackState::Loading);
    assert_eq!(h.orchestrator.session(), session);
}

#[test]
fn test_native_decode_error_transcodes() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("file:///movies/clip.mp4"));
    assert_eq!(h.sink.current_source().as_deref(), Some("file:///movies/clip.mp4"));

    h.sink_event(SinkEvent::Error(MediaErrorCode::SrcNotSupported));
    assert_eq!(h.bridge.last_start().unwrap().1, "/movies/clip.mp4");
    assert_eq!(h.sink.current_source(), None);
}

#[test]
fn test_native_network_error_reloads_within_budget() {
    let mut h = Harness::new();
    h.set_source(SourceReference::on_demand("http://host/movie.mp4"));

    for _ in 0..3 {
        h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    }
    assert_eq!(h.sink.count("load"), 4);
    assert!(h.status().error().is_none());

    h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    assert_eq!(h.status().error().unwrap().kind, ErrorKind::NetworkTransient);
}

#[test]
fn test_transport_network_error_reloads_within_budget() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("http://host/live/u/p/123"));
    assert_eq!(h.engines.count("ts.load"), 1);

    for _ in 0..3 {
        h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    }
    assert_eq!(h.engines.count("ts.unload"), 3);
    assert_eq!(h.engines.count("ts.load"), 4);
    assert_eq!(h.status().engine, Some(EngineKind::TransportStream));
    assert!(h.status().error().is_none());

    h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    assert_eq!(h.status().error().unwrap().kind, ErrorKind::NetworkTransient);
    assert_eq!(h.status().affordance(), Some(FailureAffordance::Retry));
    assert_eq!(h.engines.live(), 0);
    assert_eq!(h.bridge.starts(), 0);
}

#[test]
fn test_transport_progress_resets_network_budget() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("http://host/live/u/p/123"));

    for _ in 0..3 {
        h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    }
    h.sink_event(SinkEvent::TimeUpdate {
        position: 5.0,
        buffered_end: Some(8.0),
    });
    for _ in 0..3 {
        h.sink_event(SinkEvent::Error(MediaErrorCode::Network));
    }

    assert_eq!(h.engines.count("ts.load"), 7);
    assert!(h.status().error().is_none());
}

#[test]
fn test_unvalidated_buffer_settings_still_attach() {
    let mut config = PlayerConfig::default();
    config.manifest.max_buffer_hole_secs = -0.5;
    config.manifest.live_max_max_buffer_secs = f64::NAN;
    let mut h = Harness::build(config, FakeSink::new(), FakeProvider::new());

    h.set_source(SourceReference::live("https://host/a.m3u8"));

    assert_eq!(h.status().engine, Some(EngineKind::Manifest));
    assert_eq!(h.engines.live(), 1);
    assert!(h.engines.manifest_configs()[0].max_buffer_hole > std::time::Duration::ZERO);
}

#[test]
fn test_empty_source_is_unsupported() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("   "));

    assert_eq!(h.status().error().unwrap().kind, ErrorKind::FormatUnsupported);
    assert_eq!(h.bridge.starts(), 0);
    assert_eq!(h.engines.created(), 0);
}

#[test]
fn test_volume_and_mute() {
    let mut h = Harness::new();
    h.dispatch(Input::SetVolume(0.0));
    assert!(h.status().muted);
    assert_eq!(h.status().volume, 0.0);

    h.dispatch(Input::SetVolume(1.7));
    assert_eq!(h.status().volume, 1.0);
    assert!(!h.status().muted);

    h.dispatch(Input::ToggleMute);
    assert!(h.status().muted);
    h.dispatch(Input::SetMuted(false));
    assert!(!h.status().muted);

    // Transport settings survive a source change.
    h.dispatch(Input::SetVolume(0.4));
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    assert_eq!(h.status().volume, 0.4);
}

#[test]
fn test_view_state_saved_on_select_not_on_retry() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("last_viewed.json"));
    let view = LastViewed {
        playlist_id: "pl-1".to_string(),
        channel_id: Some("ch-9".to_string()),
        category_id: Some("sports".to_string()),
        content_type: ContentKind::Live,
    };

    let mut h = Harness::new().with_view_store(Box::new(store.clone()));
    h.set_source(SourceReference::live("https://host/a.m3u8").with_view_context(view.clone()));
    assert_eq!(store.load().unwrap(), Some(view.clone()));
    assert_eq!(h.orchestrator.restore_view_state(), Some(view));

    std::fs::remove_file(store.path()).unwrap();
    h.dispatch(Input::Retry);
    assert!(!store.path().exists());
}

#[test]
fn test_status_is_published() {
    let mut h = Harness::new();
    let mut rx = h.orchestrator.subscribe();
    assert_eq!(rx.borrow_and_update().state, PlaybackState::Idle);

    h.set_source(SourceReference::live("https://host/a.m3u8"));
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().state, PlaybackState::Loading);

    // No change, no notification.
    h.dispatch(Input::Seek(10.0));
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn test_drop_releases_engine_and_transcoder() {
    let mut h = Harness::new();
    h.set_source(SourceReference::live("https://host/a.m3u8"));
    let Harness {
        orchestrator,
        engines,
        bridge,
        ..
    } = h;
    let stops = bridge.stops();

    drop(orchestrator);
    assert_eq!(engines.live(), 0);
    assert_eq!(bridge.stops(), stops + 1);
}
