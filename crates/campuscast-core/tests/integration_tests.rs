//! Integration tests for CampusCast Core

use campuscast_core::sim::{
    EngineCall, MediaCall, Observed, RecordingObserver, ScriptedEngine, ScriptedEngineFactory,
    SimulatedFullscreen, SimulatedMedia,
};
use campuscast_core::{
    ClickTarget, EngineErrorData, EngineErrorDetails, EngineErrorType, EngineLevel, Error, Focus,
    HlsPlayer, Key, MediaElement, MediaEvent, PlaybackError, PlaybackErrorKind, PlaybackMode,
    PlaybackSource, PlayerOptions, PlayerStatus, QualityMenu, QualityPreference, QualitySelection,
    QualityState, RawEngineEvent, SwitchOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct Harness {
    factory: Arc<ScriptedEngineFactory>,
    media: Arc<SimulatedMedia>,
    fullscreen: Arc<SimulatedFullscreen>,
    observer: Arc<RecordingObserver>,
    player: Arc<HlsPlayer>,
}

impl Harness {
    fn with(factory: ScriptedEngineFactory, media: SimulatedMedia, options: PlayerOptions) -> Self {
        let factory = Arc::new(factory);
        let media = Arc::new(media);
        let fullscreen = Arc::new(SimulatedFullscreen::new());
        let observer = Arc::new(RecordingObserver::new());
        let player = Arc::new(
            HlsPlayer::new(media.clone(), factory.clone(), fullscreen.clone(), options)
                .with_observer(observer.clone()),
        );
        Self {
            factory,
            media,
            fullscreen,
            observer,
            player,
        }
    }

    fn new(heights: &[u32]) -> Self {
        Self::with(
            ScriptedEngineFactory::with_heights(heights),
            SimulatedMedia::new(),
            PlayerOptions::default(),
        )
    }

    fn engine(&self) -> Arc<ScriptedEngine> {
        self.factory.last().expect("engine created")
    }

    /// Load a source and deliver the manifest
    async fn ready(&self) {
        let source = PlaybackSource::new("https://cdn.example.edu/lec/master.m3u8");
        assert_ok!(self.player.load(source).await);
        let parsed = self.engine().manifest_parsed();
        self.player.handle_engine_event(parsed).await;
    }

    /// Playing at `position` with `ahead` seconds buffered
    fn playing(&self, position: f64, ahead: f64) {
        self.media.set_duration(600.0);
        self.media.set_position(position);
        self.media.set_buffered_end(Some(position + ahead));
        self.media.set_playing(true);
    }

    async fn switched(&self, level: usize) {
        self.player
            .handle_engine_event(RawEngineEvent::LevelSwitched { level })
            .await;
    }
}

fn fatal(error_type: EngineErrorType, details: EngineErrorDetails) -> RawEngineEvent {
    RawEngineEvent::Error(EngineErrorData {
        error_type,
        details,
        fatal: true,
    })
}

// =============================================================================
// Quality Switching Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_repeated_manual_request_single_commit() {
    let h = Harness::new(&[1080, 720, 480]);
    h.ready().await;

    let first = h.player.set_quality(QualityPreference::LevelIndex(1)).await.unwrap();
    let second = h.player.set_quality(QualityPreference::LevelIndex(1)).await.unwrap();

    assert_eq!(first, SwitchOutcome::Committed);
    assert_eq!(second, SwitchOutcome::Redundant);
    assert_eq!(h.engine().commit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_to_manual_at_playing_level_skips_engine() {
    let h = Harness::new(&[1080, 720, 480]);
    h.ready().await;
    h.switched(1).await;
    let calls_before = h.engine().calls();

    let outcome = h.player.set_quality(QualityPreference::LevelIndex(1)).await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Relabeled);
    assert_eq!(h.engine().calls(), calls_before);
    assert_eq!(h.player.current_level().await, QualitySelection::Manual(1));
}

#[tokio::test(start_paused = true)]
async fn test_selection_always_single_valued() {
    let h = Harness::new(&[1080, 720, 480]);
    h.ready().await;

    let requests = [
        QualityPreference::LevelIndex(2),
        QualityPreference::Auto,
        QualityPreference::Height(720),
        QualityPreference::LevelIndex(0),
        QualityPreference::Auto,
    ];
    for preference in requests {
        h.player.set_quality(preference).await.unwrap();
        let selection = h.player.current_level().await;
        match preference {
            QualityPreference::Auto => assert_eq!(selection, QualitySelection::Auto),
            _ => assert!(matches!(selection, QualitySelection::Manual(_))),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_switch_converges_after_level_switched() {
    let h = Harness::new(&[1080, 720, 480]);
    h.ready().await;

    h.player.set_quality(QualityPreference::LevelIndex(2)).await.unwrap();
    h.player
        .handle_engine_event(RawEngineEvent::LevelSwitching { level: 2 })
        .await;
    h.switched(2).await;

    assert_eq!(h.player.actual_level().await, Some(2));
    assert_eq!(h.player.current_level().await, QualitySelection::Manual(2));
    assert!(!h.player.view().await.switching);
    assert!(h
        .observer
        .events()
        .iter()
        .any(|e| matches!(
            e,
            Observed::QualityChanged(c) if c.level_index == 2 && c.height == Some(480)
        )));
}

#[tokio::test(start_paused = true)]
async fn test_quality_switch_mid_playback() {
    let h = Harness::new(&[1080, 720]);
    h.ready().await;
    h.switched(0).await;
    h.playing(42.0, 5.0);

    let mut states = h.player.subscribe_quality();
    let player = h.player.clone();
    let request =
        tokio::spawn(async move { player.set_quality(QualityPreference::LevelIndex(1)).await });

    assert_ok!(states.changed().await);
    assert_eq!(*states.borrow_and_update(), QualityState::Switching(1));
    assert_eq!(h.engine().next_level(), Some(1));

    assert_eq!(request.await.unwrap().unwrap(), SwitchOutcome::Committed);
    assert_eq!(h.media.play_calls(), 1);

    h.switched(1).await;
    assert_eq!(h.player.quality_state().await, QualityState::Manual(1));
    assert_eq!(h.player.actual_level().await, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_low_buffer_switch_waits_before_resuming() {
    let h = Harness::new(&[1080, 720]);
    h.ready().await;
    h.playing(42.0, 0.5);

    h.player.set_quality(QualityPreference::LevelIndex(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.media.play_calls(), 0);

    h.media.set_buffered_end(Some(45.0));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.media.play_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_resume_poll_stops_all_work() {
    let h = Harness::new(&[1080, 720]);
    h.ready().await;
    h.playing(42.0, 0.0);

    h.player.set_quality(QualityPreference::LevelIndex(1)).await.unwrap();
    h.player.destroy().await;

    let engine_calls = h.engine().calls();
    h.media.clear_calls();
    h.media.set_buffered_end(Some(120.0));
    tokio::time::sleep(Duration::from_secs(10)).await;
    h.switched(0).await;

    assert!(h.media.calls().is_empty());
    assert_eq!(h.engine().calls(), engine_calls);
    assert_eq!(engine_calls.last(), Some(&EngineCall::Destroy));
    assert_eq!(h.player.status().await, PlayerStatus::Destroyed);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_before_commit_abandons_switch() {
    let h = Harness::new(&[1080, 720]);
    h.ready().await;

    let player = h.player.clone();
    let request =
        tokio::spawn(async move { player.set_quality(QualityPreference::LevelIndex(1)).await });
    tokio::task::yield_now().await;
    h.player.destroy().await;

    assert_eq!(request.await.unwrap().unwrap(), SwitchOutcome::Superseded);
    assert_eq!(h.engine().commit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_source_change_discards_in_flight_switch() {
    let h = Harness::new(&[1080, 720]);
    h.ready().await;
    let first_engine = h.engine();

    let player = h.player.clone();
    let request =
        tokio::spawn(async move { player.set_quality(QualityPreference::LevelIndex(1)).await });
    tokio::task::yield_now().await;

    let other = PlaybackSource::new("https://cdn.example.edu/other/master.m3u8");
    assert_ok!(h.player.load(other).await);
    assert_eq!(request.await.unwrap().unwrap(), SwitchOutcome::Superseded);

    assert!(first_engine.is_destroyed());
    assert_eq!(first_engine.commit_count(), 0);
    assert_eq!(h.engine().commit_count(), 0);
    assert!(h.player.levels().await.is_empty());
    assert_eq!(h.player.status().await, PlayerStatus::Loading);
}

#[tokio::test(start_paused = true)]
async fn test_initial_height_preference_applied_on_manifest() {
    let options = PlayerOptions {
        initial_quality: QualityPreference::Height(700),
        ..PlayerOptions::default()
    };
    let factory = ScriptedEngineFactory::with_heights(&[1080, 720, 360]);
    let h = Harness::with(factory, SimulatedMedia::new(), options);
    h.ready().await;

    assert_eq!(h.player.current_level().await, QualitySelection::Manual(1));
    assert_eq!(h.engine().current_level(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_levels_sorted_for_display() {
    let levels = vec![
        EngineLevel { height: Some(480), width: None, bitrate: 800_000, codecs: None },
        EngineLevel { height: Some(1080), width: None, bitrate: 5_000_000, codecs: None },
        EngineLevel { height: None, width: None, bitrate: 300_000, codecs: None },
    ];
    let h = Harness::with(
        ScriptedEngineFactory::new(levels),
        SimulatedMedia::new(),
        PlayerOptions::default(),
    );
    h.ready().await;

    let labels: Vec<String> = h.player.levels().await.into_iter().map(|l| l.label).collect();
    assert_eq!(labels, vec!["1080p (5000 kbps)", "480p (800 kbps)", "Quality 3 (300 kbps)"]);
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fatal_codec_error_is_terminal() {
    let h = Harness::new(&[1080, 720]);
    h.ready().await;

    let codecs = fatal(EngineErrorType::Media, EngineErrorDetails::ManifestIncompatibleCodecs);
    h.player.handle_engine_event(codecs).await;

    let kind = PlaybackErrorKind::CodecIncompatible { hevc_supported: false };
    assert_eq!(h.player.status().await, PlayerStatus::Failed(kind));
    let view = h.player.view().await;
    assert!(view
        .error_message
        .as_deref()
        .is_some_and(|m| m.starts_with("H.265/HEVC codec not supported")));

    let calls = h.engine().calls();
    let pinned = h.player.set_quality(QualityPreference::LevelIndex(1)).await.unwrap();
    assert_eq!(pinned, SwitchOutcome::Ignored);
    let auto = h.player.set_quality(QualityPreference::Auto).await.unwrap();
    assert_eq!(auto, SwitchOutcome::Redundant);
    h.switched(1).await;
    assert_eq!(h.engine().calls(), calls);
    assert!(!calls.contains(&EngineCall::RecoverMediaError));

    let errors = h.observer.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].fatal);
}

#[tokio::test(start_paused = true)]
async fn test_codec_hint_when_hevc_decodes() {
    let h = Harness::with(
        ScriptedEngineFactory::with_heights(&[1080]),
        SimulatedMedia::new().with_hevc(true),
        PlayerOptions::default(),
    );
    h.ready().await;
    let codecs = fatal(EngineErrorType::Media, EngineErrorDetails::ManifestIncompatibleCodecs);
    h.player.handle_engine_event(codecs).await;

    let message = h.player.view().await.error_message.unwrap();
    assert!(message.starts_with("Video codec incompatible"));
}

#[tokio::test(start_paused = true)]
async fn test_media_error_recovered_once() {
    let h = Harness::new(&[720]);
    h.ready().await;
    let decode = || {
        fatal(EngineErrorType::Media, EngineErrorDetails::Other("bufferAppendError".into()))
    };

    h.player.handle_engine_event(decode()).await;
    assert_eq!(h.player.status().await, PlayerStatus::Ready);
    assert_eq!(h.observer.errors().len(), 1);
    assert!(!h.observer.errors()[0].fatal);

    h.player.handle_engine_event(decode()).await;
    assert_eq!(h.player.status().await, PlayerStatus::Failed(PlaybackErrorKind::Media));
    let recoveries = h
        .engine()
        .calls()
        .into_iter()
        .filter(|c| *c == EngineCall::RecoverMediaError)
        .count();
    assert_eq!(recoveries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_surfaces_without_retry() {
    let h = Harness::new(&[720]);
    h.ready().await;

    let fragment = EngineErrorDetails::Other("fragLoadError".into());
    h.player.handle_engine_event(fatal(EngineErrorType::Network, fragment)).await;

    assert_eq!(h.player.status().await, PlayerStatus::Failed(PlaybackErrorKind::Network));
    assert_eq!(h.factory.created_count(), 1);
    assert!(!h.engine().calls().contains(&EngineCall::RecoverMediaError));
}

#[tokio::test(start_paused = true)]
async fn test_non_fatal_errors_keep_playing() {
    let h = Harness::new(&[720]);
    h.ready().await;

    h.player
        .handle_engine_event(RawEngineEvent::Error(EngineErrorData {
            error_type: EngineErrorType::Network,
            details: EngineErrorDetails::Other("fragLoadTimeOut".into()),
            fatal: false,
        }))
        .await;

    assert_eq!(h.player.status().await, PlayerStatus::Ready);
    assert_eq!(h.observer.errors()[0].kind, PlaybackErrorKind::Network);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_platform() {
    let h = Harness::with(
        ScriptedEngineFactory::with_heights(&[720]).unsupported(),
        SimulatedMedia::new(),
        PlayerOptions::default(),
    );

    let err = h.player.load(PlaybackSource::new("x.m3u8")).await.unwrap_err();
    assert!(matches!(err, Error::Playback(PlaybackErrorKind::Unsupported)));
    assert_eq!(
        h.player.view().await.error_message.as_deref(),
        Some("HLS is not supported in this browser.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_engine_construction_failure_is_terminal() {
    let h = Harness::with(
        ScriptedEngineFactory::with_heights(&[720]).broken(),
        SimulatedMedia::new(),
        PlayerOptions::default(),
    );

    let err = h.player.load(PlaybackSource::new("x.m3u8")).await.unwrap_err();
    assert!(matches!(err, Error::EngineCreate(_)));

    let kind = PlaybackErrorKind::EngineUnavailable;
    assert_eq!(h.player.status().await, PlayerStatus::Failed(kind));
    let view = h.player.view().await;
    assert!(!view.loading);
    assert_eq!(view.error_message.as_deref(), Some(kind.message()));
    assert_eq!(h.observer.errors(), vec![PlaybackError { kind, fatal: true }]);
    assert_eq!(*h.player.subscribe_view().borrow(), view);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_autoplay_is_not_fatal() {
    let options = PlayerOptions {
        autoplay: true,
        ..PlayerOptions::default()
    };
    let media = SimulatedMedia::new();
    media.reject_play(true);
    let h = Harness::with(ScriptedEngineFactory::with_heights(&[720]), media, options);

    h.ready().await;

    assert_eq!(h.media.play_calls(), 1);
    assert_eq!(h.player.status().await, PlayerStatus::Ready);
    assert_err!(h.player.play().await);
    assert!(h.observer.errors().is_empty());
}

// =============================================================================
// Native Playback Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_native_playback_hides_quality_menu() {
    let h = Harness::with(
        ScriptedEngineFactory::with_heights(&[720]),
        SimulatedMedia::new().with_native_hls(true),
        PlayerOptions::default(),
    );

    let mode = h.player.load(PlaybackSource::new("https://cdn/master.m3u8")).await.unwrap();
    assert_eq!(mode, PlaybackMode::Native);
    assert_eq!(h.player.status().await, PlayerStatus::Ready);
    assert_eq!(h.observer.events(), vec![Observed::Ready]);
    assert_eq!(h.media.src().as_deref(), Some("https://cdn/master.m3u8"));

    let outcome = h.player.set_quality(QualityPreference::LevelIndex(0)).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Ignored);
    assert_eq!(h.player.view().await.quality_menu, QualityMenu::Native);
    assert_eq!(h.factory.created_count(), 0);
}

// =============================================================================
// Input Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_click_toggles_play_once() {
    let h = Harness::new(&[720]);
    h.ready().await;

    h.player.handle_click(ClickTarget::Video).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.media.calls(), vec![MediaCall::Play]);
    assert_eq!(h.fullscreen.requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_double_click_toggles_fullscreen_only() {
    let h = Harness::new(&[720]);
    h.ready().await;

    h.player.handle_click(ClickTarget::Video).await;
    tokio::time::sleep(Duration::from_millis(120)).await;
    h.player.handle_click(ClickTarget::Video).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.fullscreen.requests(), 1);
    assert!(h.media.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fullscreen_follows_platform_signal() {
    let h = Harness::new(&[720]);
    h.ready().await;

    h.player.toggle_fullscreen();
    assert_eq!(h.fullscreen.requests(), 1);
    assert!(!h.player.view().await.fullscreen);

    h.player.handle_fullscreen_change(true).await;
    assert!(h.player.view().await.fullscreen);

    tokio::time::sleep(Duration::from_millis(3100)).await;
    let view = h.player.view().await;
    assert!(!view.controls_visible);
    assert!(view.cursor_hidden);

    h.player.handle_pointer_move().await;
    assert!(h.player.view().await.controls_visible);
}

#[tokio::test(start_paused = true)]
async fn test_keyboard_shortcuts_respect_focus() {
    let h = Harness::new(&[720]);
    h.ready().await;
    h.media.set_duration(300.0);
    h.media.set_position(2.0);

    assert!(h.player.handle_key(Key::ArrowLeft, Focus::TextInput).await.is_none());
    h.player.handle_key(Key::ArrowLeft, Focus::Page).await;
    assert_eq!(h.player.view().await.clock.current_time_sec, 0.0);

    h.player.handle_key(Key::ArrowUp, Focus::Page).await;
    assert_eq!(h.player.view().await.volume, 1.0);
}

// =============================================================================
// Transport Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_seek_and_volume_clamping() {
    let h = Harness::new(&[720]);
    h.ready().await;
    h.media.set_duration(300.0);
    h.media.set_position(150.0);

    h.player.seek_to(-9999.0);
    assert_eq!(h.media.current_time(), 0.0);
    h.player.seek_to(9999.0);
    assert_eq!(h.media.current_time(), 300.0);

    h.player.set_volume(9999.0);
    let view = h.player.view().await;
    assert_eq!(view.volume, 1.0);
    assert!(!view.muted);

    h.player.set_volume(0.0);
    assert!(h.media.is_muted());
}

#[tokio::test(start_paused = true)]
async fn test_view_reflects_media_events() {
    let h = Harness::new(&[1080, 720]);
    h.ready().await;
    h.media.set_duration(125.0);
    h.media.set_position(65.0);
    h.media.set_buffered_end(Some(90.0));

    h.player.handle_media_event(MediaEvent::CanPlay).await;
    h.player.handle_media_event(MediaEvent::Play).await;
    h.player.handle_media_event(MediaEvent::TimeUpdate).await;

    let view = h.player.subscribe_view().borrow().clone();
    assert!(view.playing);
    assert!(!view.loading);
    assert_eq!(view.elapsed_label, "1:05");
    assert_eq!(view.total_label, "2:05");
    assert_eq!(view.clock.buffered_ahead_sec, 25.0);
    assert!(matches!(view.quality_menu, QualityMenu::Levels(ref rows) if rows.len() == 3));
}

// =============================================================================
// Stats Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stats_every_five_seconds_while_engine_exists() {
    let h = Harness::with(
        ScriptedEngineFactory::with_heights(&[720]).with_bandwidth(3_000_000),
        SimulatedMedia::new(),
        PlayerOptions::default(),
    );
    h.ready().await;
    h.media.set_buffered_end(Some(8.0));

    tokio::time::sleep(Duration::from_millis(10_100)).await;
    let stats = h.observer.stats();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].bandwidth_kbps, Some(3000));
    assert_eq!(stats[0].buffer_sec, 8.0);

    h.player.destroy().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.observer.stats().len(), 2);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_handle_inert_after_destroy() {
    let h = Harness::new(&[720]);
    h.ready().await;
    h.player.destroy().await;
    h.media.clear_calls();

    assert!(matches!(h.player.play().await, Err(Error::Detached)));
    h.player.pause();
    h.player.toggle_mute();
    h.player.handle_click(ClickTarget::Video).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(h.media.calls().is_empty());
    assert!(h.player.media_element().is_none());
    assert!(matches!(
        h.player.load(PlaybackSource::new("x.m3u8")).await,
        Err(Error::Detached)
    ));
    assert_eq!(*h.player.subscribe_status().borrow(), PlayerStatus::Destroyed);
}
