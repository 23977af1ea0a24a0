//! HLS Player - owns one media element and orchestrates playback around it
//!
//! Coordinates:
//! - Engine lifecycle through the adapter
//! - Quality switching
//! - Transport controls and input
//! - Stats sampling
//! - Host callbacks and the published view
//!
//! Every handler is a no-op once `destroy()` has run; `play()` rejects with
//! [`Error::Detached`].

use crate::config::PlayerOptions;
use crate::engine::{EngineAdapter, EngineEvent, EngineFactory, RawEngineEvent};
use crate::error::PlaybackErrorKind;
use crate::input::{ClickTarget, Focus, FullscreenHost, InputAction, InputCoordinator, Key};
use crate::media::{clock, MediaElement, MediaEvent};
use crate::quality::{QualityController, SwitchOutcome};
use crate::source::ResolvedSource;
use crate::stats::StatsSampler;
use crate::transport::Transport;
use crate::types::*;
use crate::view::{format_time, PlayerView, QualityMenu};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// Host callbacks. Every method defaults to a no-op.
pub trait PlayerObserver: Send + Sync {
    fn on_ready(&self) {}

    fn on_play(&self) {}

    fn on_pause(&self) {}

    fn on_ended(&self) {}

    fn on_error(&self, _error: PlaybackError) {}

    fn on_quality_changed(&self, _change: QualityChange) {}

    fn on_stats(&self, _sample: StatsSample) {}
}

struct NoopObserver;

impl PlayerObserver for NoopObserver {}

/// Element-derived flags
#[derive(Debug, Default)]
struct Flags {
    loading: bool,
    playing: bool,
}

/// Adaptive HLS player bound to one media element
pub struct HlsPlayer {
    id: PlayerId,
    options: PlayerOptions,
    media: Arc<dyn MediaElement>,
    transport: Transport,
    adapter: Arc<EngineAdapter>,
    quality: Arc<QualityController>,
    input: InputCoordinator,
    stats: StatsSampler,
    observer: Arc<dyn PlayerObserver>,
    source: RwLock<Option<PlaybackSource>>,
    status: RwLock<PlayerStatus>,
    status_tx: watch::Sender<PlayerStatus>,
    flags: RwLock<Flags>,
    view_tx: watch::Sender<PlayerView>,
    destroyed: AtomicBool,
}

impl HlsPlayer {
    /// Mount a player on `media`
    pub fn new(
        media: Arc<dyn MediaElement>,
        factory: Arc<dyn EngineFactory>,
        fullscreen: Arc<dyn FullscreenHost>,
        options: PlayerOptions,
    ) -> Self {
        let (status_tx, _) = watch::channel(PlayerStatus::Idle);
        let (view_tx, _) = watch::channel(PlayerView::default());

        let transport = Transport::new(Arc::clone(&media));
        let adapter = Arc::new(EngineAdapter::new(
            factory,
            Arc::clone(&media),
            options.engine.clone(),
        ));
        let quality = Arc::new(QualityController::new(
            Arc::clone(&adapter),
            transport.clone(),
            options.switch,
        ));
        let input = InputCoordinator::new(transport.clone(), fullscreen, options.input);
        let stats =
            StatsSampler::new(Arc::clone(&adapter), Arc::clone(&media), options.stats_interval);

        media.set_preload(options.preload);
        media.set_plays_inline(options.plays_inline);
        if options.muted {
            media.set_muted(true);
        }

        Self {
            id: PlayerId::new(),
            options,
            media,
            transport,
            adapter,
            quality,
            input,
            stats,
            observer: Arc::new(NoopObserver),
            source: RwLock::new(None),
            status: RwLock::new(PlayerStatus::Idle),
            status_tx,
            flags: RwLock::new(Flags::default()),
            view_tx,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Attach host callbacks
    pub fn with_observer(mut self, observer: Arc<dyn PlayerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    pub async fn status(&self) -> PlayerStatus {
        *self.status.read().await
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlayerStatus> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<PlayerView> {
        self.view_tx.subscribe()
    }

    /// Subscribe to quality state changes, including transient switches
    pub fn subscribe_quality(&self) -> watch::Receiver<QualityState> {
        self.quality.subscribe_state()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    async fn set_status(&self, status: PlayerStatus) {
        let previous = std::mem::replace(&mut *self.status.write().await, status);
        if previous != status {
            self.status_tx.send_replace(status);
            info!(player = %self.id, from = %previous, to = %status, "Status changed");
        }
    }

    /// Load a new source. Anything belonging to the previous source (engine,
    /// levels, in-flight switch, stats) is discarded first.
    #[instrument(skip(self, source), fields(player = %self.id, uri = %source.uri))]
    pub async fn load(&self, source: PlaybackSource) -> Result<PlaybackMode> {
        if self.is_destroyed() {
            return Err(Error::Detached);
        }

        self.quality.clear().await;
        self.stats.stop();
        self.flags.write().await.loading = true;
        *self.source.write().await = Some(source.clone());
        self.set_status(PlayerStatus::Loading).await;

        let mode = match self.adapter.initialize(&source).await {
            Ok(mode) => mode,
            Err(Error::Playback(kind)) => {
                self.fail(kind).await;
                self.refresh_view().await;
                return Err(Error::Playback(kind));
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize playback");
                self.fail(PlaybackErrorKind::EngineUnavailable).await;
                self.refresh_view().await;
                return Err(e);
            }
        };

        match mode {
            PlaybackMode::Native => {
                self.set_status(PlayerStatus::Ready).await;
                self.observer.on_ready();
                if self.options.autoplay {
                    self.transport.play_or_log().await;
                }
            }
            PlaybackMode::Engine => {
                let observer = Arc::clone(&self.observer);
                self.stats
                    .start(Arc::new(move |sample: StatsSample| observer.on_stats(sample)));
            }
        }

        self.refresh_view().await;
        Ok(mode)
    }

    /// Load a resolved backend source; fails while it is not ready
    pub async fn load_resolved(&self, resolved: &ResolvedSource) -> Result<PlaybackMode> {
        let source = resolved.playback_source()?;
        self.load(source).await
    }

    /// Feed an event from the engine
    pub async fn handle_engine_event(&self, raw: RawEngineEvent) {
        if self.is_destroyed() {
            return;
        }
        let Some(event) = self.adapter.translate(raw).await else {
            return;
        };

        match event {
            EngineEvent::Ready(levels) => {
                info!(player = %self.id, levels = levels.len(), "Manifest ready");
                self.quality.set_levels(levels).await;
                if self.options.initial_quality != QualityPreference::Auto {
                    self.quality.apply_initial(self.options.initial_quality).await;
                }
                self.set_status(PlayerStatus::Ready).await;
                self.observer.on_ready();
                if self.options.autoplay {
                    self.transport.play_or_log().await;
                }
            }
            EngineEvent::LevelSwitching(target) => {
                self.quality.on_level_switching(target).await;
            }
            EngineEvent::LevelSwitched(actual) => {
                if let Some(change) = self.quality.on_level_switched(actual).await {
                    self.observer.on_quality_changed(change);
                }
            }
            EngineEvent::RecoverableError(kind) => {
                warn!(player = %self.id, %kind, "Recoverable playback error");
                self.observer.on_error(PlaybackError { kind, fatal: false });
            }
            EngineEvent::FatalError(kind) => {
                self.fail(kind).await;
            }
        }

        self.refresh_view().await;
    }

    /// Enter the terminal error state
    async fn fail(&self, kind: PlaybackErrorKind) {
        error!(player = %self.id, %kind, "Playback failed: {}", kind.message());
        self.adapter.halt().await;
        self.quality.cancel().await;
        self.stats.stop();
        self.flags.write().await.loading = false;
        self.set_status(PlayerStatus::Failed(kind)).await;
        self.observer.on_error(PlaybackError { kind, fatal: true });
    }

    /// Feed an event from the media element
    pub async fn handle_media_event(&self, event: MediaEvent) {
        if self.is_destroyed() {
            return;
        }
        debug!(player = %self.id, ?event, "Media event");

        {
            let mut flags = self.flags.write().await;
            match event {
                MediaEvent::LoadStart => flags.loading = true,
                MediaEvent::CanPlay => flags.loading = false,
                MediaEvent::Play => flags.playing = true,
                MediaEvent::Pause | MediaEvent::Ended => flags.playing = false,
                MediaEvent::TimeUpdate | MediaEvent::DurationChange | MediaEvent::VolumeChange => {}
            }
        }

        match event {
            MediaEvent::Play => self.observer.on_play(),
            MediaEvent::Pause => self.observer.on_pause(),
            MediaEvent::Ended => self.observer.on_ended(),
            _ => {}
        }

        self.refresh_view().await;
    }

    pub async fn handle_click(&self, target: ClickTarget) {
        if !self.is_destroyed() {
            self.input.handle_click(target);
        }
    }

    pub async fn handle_key(&self, key: Key, focus: Focus) -> Option<InputAction> {
        if self.is_destroyed() {
            return None;
        }
        let action = self.input.handle_key(key, focus).await;
        self.refresh_view().await;
        action
    }

    pub async fn handle_pointer_move(&self) {
        if !self.is_destroyed() {
            self.input.handle_pointer_move();
            self.refresh_view().await;
        }
    }

    pub async fn handle_pointer_leave(&self) {
        if !self.is_destroyed() {
            self.input.handle_pointer_leave();
            self.refresh_view().await;
        }
    }

    /// The platform reports fullscreen entered or exited
    pub async fn handle_fullscreen_change(&self, fullscreen: bool) {
        if !self.is_destroyed() {
            self.input.handle_fullscreen_change(fullscreen);
            self.refresh_view().await;
        }
    }

    // Imperative handle

    /// Start playback. Rejects after teardown or when the element refuses.
    pub async fn play(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Detached);
        }
        self.transport.play().await
    }

    pub fn pause(&self) {
        if !self.is_destroyed() {
            self.transport.pause();
        }
    }

    pub async fn toggle_play_pause(&self) {
        if !self.is_destroyed() {
            self.transport.toggle_play_pause().await;
        }
    }

    pub fn toggle_mute(&self) {
        if !self.is_destroyed() {
            self.transport.toggle_mute();
        }
    }

    pub fn toggle_fullscreen(&self) {
        if !self.is_destroyed() {
            self.input.toggle_fullscreen();
        }
    }

    /// Progress bar seek
    pub fn seek_to(&self, position_sec: f64) {
        if !self.is_destroyed() {
            self.transport.seek_to(position_sec);
        }
    }

    /// Volume slider
    pub fn set_volume(&self, volume: f64) {
        if !self.is_destroyed() {
            self.transport.set_volume(volume);
        }
    }

    /// Change quality. Ignored in native mode, where the platform runs ABR.
    pub async fn set_quality(&self, preference: QualityPreference) -> Result<SwitchOutcome> {
        if self.is_destroyed() {
            return Ok(SwitchOutcome::Ignored);
        }
        if self.adapter.mode().await != Some(PlaybackMode::Engine) {
            debug!(player = %self.id, "Quality request ignored without a software engine");
            return Ok(SwitchOutcome::Ignored);
        }

        let outcome = self.quality.request(preference).await;
        self.refresh_view().await;
        outcome
    }

    pub async fn current_level(&self) -> QualitySelection {
        self.quality.selection().await
    }

    pub async fn quality_state(&self) -> QualityState {
        self.quality.state().await
    }

    /// Level the engine last reported as playing
    pub async fn actual_level(&self) -> Option<usize> {
        self.quality.actual_level().await
    }

    pub async fn levels(&self) -> Vec<QualityLevel> {
        self.quality.levels().await
    }

    /// The underlying element, `None` after teardown
    pub fn media_element(&self) -> Option<Arc<dyn MediaElement>> {
        (!self.is_destroyed()).then(|| Arc::clone(&self.media))
    }

    /// Tear everything down. Pending switches, polls and timers are
    /// abandoned and the engine is released. Safe to call repeatedly.
    #[instrument(skip(self), fields(player = %self.id))]
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.quality.cancel().await;
        self.input.cancel();
        self.stats.stop();
        self.adapter.destroy().await;
        self.set_status(PlayerStatus::Destroyed).await;
        self.refresh_view().await;
        info!("Player destroyed");
    }

    /// Build a fresh view snapshot
    pub async fn view(&self) -> PlayerView {
        let status = self.status().await;
        let (loading, playing) = {
            let flags = self.flags.read().await;
            (flags.loading, flags.playing)
        };
        let clock = clock(self.media.as_ref());
        let fullscreen = self.input.is_fullscreen();
        let controls_visible = self.input.controls_visible();

        let quality_menu = QualityMenu::build(
            self.adapter.mode().await,
            &self.quality.levels().await,
            self.quality.selection().await,
            self.quality.actual_level().await,
        );

        let error_message = match status {
            PlayerStatus::Failed(kind) => Some(kind.message().to_string()),
            _ => None,
        };

        PlayerView {
            status,
            poster_uri: self.source.read().await.as_ref().and_then(|s| s.poster_uri.clone()),
            loading,
            switching: !loading && self.quality.is_switching().await,
            playing,
            clock,
            elapsed_label: format_time(clock.current_time_sec),
            total_label: format_time(clock.duration_sec),
            volume: self.media.volume(),
            muted: self.media.is_muted(),
            quality_menu,
            fullscreen,
            controls_visible,
            cursor_hidden: fullscreen && !controls_visible,
            error_message,
        }
    }

    async fn refresh_view(&self) {
        let view = self.view().await;
        self.view_tx.send_replace(view);
    }
}
