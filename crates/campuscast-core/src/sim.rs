//! In-process stand-ins for the host collaborators
//!
//! A scripted engine, a simulated media element, a fullscreen host and a
//! recording observer. The CLI `simulate` command drives the controller
//! with these, and the test suites use them as mocks: every command that
//! reaches them is appended to a call log.

use crate::config::{EngineConfig, Preload};
use crate::engine::{EngineFactory, EngineLevel, HlsEngine, RawEngineEvent};
use crate::input::FullscreenHost;
use crate::media::{MediaElement, HEVC_CANDIDATES, NATIVE_HLS_MIME};
use crate::player::PlayerObserver;
use crate::types::{PlaybackError, QualityChange, StatsSample};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Commands received by a [`SimulatedMedia`]
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    SetSrc(String),
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
}

#[derive(Debug)]
struct MediaState {
    src: Option<String>,
    paused: bool,
    current_time: f64,
    duration: f64,
    volume: f64,
    muted: bool,
    buffered_end: Option<f64>,
    preload: Preload,
    plays_inline: bool,
    calls: Vec<MediaCall>,
}

/// A media element with scriptable clock and buffer
#[derive(Debug)]
pub struct SimulatedMedia {
    state: Mutex<MediaState>,
    native_hls: bool,
    hevc: bool,
    reject_play: AtomicBool,
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMedia {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MediaState {
                src: None,
                paused: true,
                current_time: 0.0,
                duration: f64::NAN,
                volume: 1.0,
                muted: false,
                buffered_end: None,
                preload: Preload::Auto,
                plays_inline: false,
                calls: Vec::new(),
            }),
            native_hls: false,
            hevc: false,
            reject_play: AtomicBool::new(false),
        }
    }

    pub fn with_native_hls(mut self, native: bool) -> Self {
        self.native_hls = native;
        self
    }

    pub fn with_hevc(mut self, hevc: bool) -> Self {
        self.hevc = hevc;
        self
    }

    /// Make subsequent `play()` calls fail the way an autoplay policy does
    pub fn reject_play(&self, reject: bool) {
        self.reject_play.store(reject, Ordering::SeqCst);
    }

    pub fn set_duration(&self, duration: f64) {
        lock(&self.state).duration = duration;
    }

    pub fn set_buffered_end(&self, end: Option<f64>) {
        lock(&self.state).buffered_end = end;
    }

    /// Move the playhead without logging a seek
    pub fn set_position(&self, seconds: f64) {
        lock(&self.state).current_time = seconds;
    }

    /// Mark the element as playing without going through `play()`
    pub fn set_playing(&self, playing: bool) {
        lock(&self.state).paused = !playing;
    }

    pub fn src(&self) -> Option<String> {
        lock(&self.state).src.clone()
    }

    pub fn preload(&self) -> Preload {
        lock(&self.state).preload
    }

    pub fn plays_inline(&self) -> bool {
        lock(&self.state).plays_inline
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        lock(&self.state).calls.clone()
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.state).calls.iter().filter(|c| **c == MediaCall::Play).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

#[async_trait]
impl MediaElement for SimulatedMedia {
    fn can_play_type(&self, mime: &str) -> bool {
        if mime == NATIVE_HLS_MIME {
            return self.native_hls;
        }
        if HEVC_CANDIDATES.contains(&mime) {
            return self.hevc;
        }
        mime.starts_with("video/mp4")
    }

    fn set_src(&self, uri: &str) {
        let mut state = lock(&self.state);
        state.src = Some(uri.to_string());
        state.calls.push(MediaCall::SetSrc(uri.to_string()));
    }

    fn set_preload(&self, preload: Preload) {
        lock(&self.state).preload = preload;
    }

    fn set_plays_inline(&self, inline: bool) {
        lock(&self.state).plays_inline = inline;
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    async fn play(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(MediaCall::Play);
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(Error::PlayRejected("NotAllowedError".into()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&self) {
        let mut state = lock(&self.state);
        state.paused = true;
        state.calls.push(MediaCall::Pause);
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    fn set_current_time(&self, seconds: f64) {
        let mut state = lock(&self.state);
        state.current_time = seconds;
        state.calls.push(MediaCall::Seek(seconds));
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn volume(&self) -> f64 {
        lock(&self.state).volume
    }

    fn set_volume(&self, volume: f64) {
        let mut state = lock(&self.state);
        state.volume = volume;
        state.calls.push(MediaCall::SetVolume(volume));
    }

    fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }

    fn set_muted(&self, muted: bool) {
        let mut state = lock(&self.state);
        state.muted = muted;
        state.calls.push(MediaCall::SetMuted(muted));
    }

    fn buffered_end(&self) -> Option<f64> {
        lock(&self.state).buffered_end
    }
}

/// Commands received by a [`ScriptedEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    LoadSource(String),
    AttachMedia,
    SetNextLevel(usize),
    SetCurrentLevel(usize),
    SetAutoLevel,
    RecoverMediaError,
    Destroy,
}

impl EngineCall {
    /// Commands that change which level plays
    pub fn is_level_commit(&self) -> bool {
        matches!(self, EngineCall::SetCurrentLevel(_) | EngineCall::SetAutoLevel)
    }
}

#[derive(Debug)]
struct EngineState {
    levels: Vec<EngineLevel>,
    current_level: Option<usize>,
    next_level: Option<usize>,
    auto_level: bool,
    bandwidth: Option<u64>,
    destroyed: bool,
    calls: Vec<EngineCall>,
}

/// An engine that records commands and reports a fixed level ladder
#[derive(Debug)]
pub struct ScriptedEngine {
    state: Mutex<EngineState>,
}

impl ScriptedEngine {
    pub fn new(levels: Vec<EngineLevel>, bandwidth: Option<u64>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                levels,
                current_level: None,
                next_level: None,
                auto_level: true,
                bandwidth,
                destroyed: false,
                calls: Vec::new(),
            }),
        }
    }

    /// The event the engine fires once its manifest is parsed
    pub fn manifest_parsed(&self) -> RawEngineEvent {
        RawEngineEvent::ManifestParsed {
            levels: lock(&self.state).levels.clone(),
        }
    }

    pub fn set_bandwidth(&self, bandwidth: Option<u64>) {
        lock(&self.state).bandwidth = bandwidth;
    }

    pub fn current_level(&self) -> Option<usize> {
        lock(&self.state).current_level
    }

    pub fn next_level(&self) -> Option<usize> {
        lock(&self.state).next_level
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of level commits (`SetCurrentLevel` or `SetAutoLevel`)
    pub fn commit_count(&self) -> usize {
        lock(&self.state).calls.iter().filter(|c| c.is_level_commit()).count()
    }
}

impl HlsEngine for ScriptedEngine {
    fn load_source(&self, uri: &str) {
        lock(&self.state).calls.push(EngineCall::LoadSource(uri.to_string()));
    }

    fn attach_media(&self, _media: Arc<dyn MediaElement>) {
        lock(&self.state).calls.push(EngineCall::AttachMedia);
    }

    fn levels(&self) -> Vec<EngineLevel> {
        lock(&self.state).levels.clone()
    }

    fn set_next_level(&self, index: usize) {
        let mut state = lock(&self.state);
        state.next_level = Some(index);
        state.calls.push(EngineCall::SetNextLevel(index));
    }

    fn set_current_level(&self, index: usize) {
        let mut state = lock(&self.state);
        state.current_level = Some(index);
        state.auto_level = false;
        state.calls.push(EngineCall::SetCurrentLevel(index));
    }

    fn set_auto_level(&self) {
        let mut state = lock(&self.state);
        state.auto_level = true;
        state.calls.push(EngineCall::SetAutoLevel);
    }

    fn auto_level_enabled(&self) -> bool {
        lock(&self.state).auto_level
    }

    fn bandwidth_estimate(&self) -> Option<u64> {
        lock(&self.state).bandwidth
    }

    fn recover_media_error(&self) {
        lock(&self.state).calls.push(EngineCall::RecoverMediaError);
    }

    fn destroy(&self) {
        let mut state = lock(&self.state);
        state.destroyed = true;
        state.calls.push(EngineCall::Destroy);
    }
}

/// Hands out [`ScriptedEngine`]s and keeps every instance it created
#[derive(Debug)]
pub struct ScriptedEngineFactory {
    levels: Vec<EngineLevel>,
    bandwidth: Option<u64>,
    supported: bool,
    /// `create` fails instead of building an engine
    broken: bool,
    created: Mutex<Vec<Arc<ScriptedEngine>>>,
}

impl ScriptedEngineFactory {
    pub fn new(levels: Vec<EngineLevel>) -> Self {
        Self {
            levels,
            bandwidth: None,
            supported: true,
            broken: false,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Build a ladder from heights, with bitrates scaled to the height
    pub fn with_heights(heights: &[u32]) -> Self {
        let levels = heights
            .iter()
            .map(|&height| EngineLevel {
                height: Some(height),
                width: Some(height * 16 / 9),
                bitrate: u64::from(height) * 4_000,
                codecs: Some("hvc1.1.6.L93.B0,mp4a.40.2".to_string()),
            })
            .collect();
        Self::new(levels)
    }

    pub fn with_bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Report support but fail every `create`
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Most recently created engine
    pub fn last(&self) -> Option<Arc<ScriptedEngine>> {
        lock(&self.created).last().cloned()
    }

    pub fn created_count(&self) -> usize {
        lock(&self.created).len()
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, _config: &EngineConfig) -> Result<Arc<dyn HlsEngine>> {
        if self.broken {
            return Err(Error::EngineCreate("scripted engine refused to start".into()));
        }
        let engine = Arc::new(ScriptedEngine::new(self.levels.clone(), self.bandwidth));
        lock(&self.created).push(Arc::clone(&engine));
        Ok(engine)
    }
}

/// Counts fullscreen requests; the platform's answer is delivered separately
#[derive(Debug, Default)]
pub struct SimulatedFullscreen {
    requests: AtomicU32,
    exits: AtomicU32,
}

impl SimulatedFullscreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn exits(&self) -> u32 {
        self.exits.load(Ordering::SeqCst)
    }
}

impl FullscreenHost for SimulatedFullscreen {
    fn request_fullscreen(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn exit_fullscreen(&self) {
        self.exits.fetch_add(1, Ordering::SeqCst);
    }
}

/// Callbacks received by a [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Ready,
    Play,
    Pause,
    Ended,
    Error(PlaybackError),
    QualityChanged(QualityChange),
    Stats(StatsSample),
}

/// Observer that keeps every callback in order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Observed> {
        lock(&self.events).clone()
    }

    pub fn stats(&self) -> Vec<StatsSample> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                Observed::Stats(sample) => Some(*sample),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<PlaybackError> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                Observed::Error(error) => Some(*error),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Observed) {
        lock(&self.events).push(event);
    }
}

impl PlayerObserver for RecordingObserver {
    fn on_ready(&self) {
        self.push(Observed::Ready);
    }

    fn on_play(&self) {
        self.push(Observed::Play);
    }

    fn on_pause(&self) {
        self.push(Observed::Pause);
    }

    fn on_ended(&self) {
        self.push(Observed::Ended);
    }

    fn on_error(&self, error: PlaybackError) {
        self.push(Observed::Error(error));
    }

    fn on_quality_changed(&self, change: QualityChange) {
        self.push(Observed::QualityChanged(change));
    }

    fn on_stats(&self, sample: StatsSample) {
        self.push(Observed::Stats(sample));
    }
}
