//! Playback Engine Adapter
//!
//! Hides the difference between native HLS playback and a software engine
//! behind one command surface, and translates the engine's own event shape
//! into the controller's vocabulary:
//!
//! ```text
//! RawEngineEvent ──► EngineAdapter::translate ──► EngineEvent
//!   ManifestParsed                                  Ready(levels)
//!   LevelSwitching                                  LevelSwitching(target)
//!   LevelSwitched                                   LevelSwitched(actual)
//!   Error{type,details,fatal}                       FatalError / RecoverableError
//! ```
//!
//! Nothing past this module sees engine-specific types.

use crate::config::EngineConfig;
use crate::error::PlaybackErrorKind;
use crate::media::{supports_hevc, supports_native_hls, MediaElement};
use crate::types::{sort_ladder, PlaybackMode, PlaybackSource, QualityLevel};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// One level as the engine reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLevel {
    pub height: Option<u32>,
    pub width: Option<u32>,
    /// Bits per second
    pub bitrate: u64,
    pub codecs: Option<String>,
}

/// Engine error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineErrorType {
    Network,
    Media,
    Mux,
    Key,
    Other,
}

/// Engine error detail code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineErrorDetails {
    ManifestIncompatibleCodecs,
    BufferStalled,
    Other(String),
}

/// Error payload in the engine's own shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineErrorData {
    pub error_type: EngineErrorType,
    pub details: EngineErrorDetails,
    pub fatal: bool,
}

/// Events in the engine's own shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RawEngineEvent {
    ManifestParsed { levels: Vec<EngineLevel> },
    LevelSwitching { level: usize },
    LevelSwitched { level: usize },
    Error(EngineErrorData),
}

/// Events in the controller's vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Manifest parsed; levels sorted for display
    Ready(Vec<QualityLevel>),
    LevelSwitching(usize),
    LevelSwitched(usize),
    FatalError(PlaybackErrorKind),
    RecoverableError(PlaybackErrorKind),
}

/// Command surface of a software adaptive-streaming engine.
///
/// Level indices refer to the engine's own level list.
pub trait HlsEngine: Send + Sync {
    fn load_source(&self, uri: &str);

    fn attach_media(&self, media: Arc<dyn MediaElement>);

    fn levels(&self) -> Vec<EngineLevel>;

    /// Hint the level to fetch next without flushing the buffer
    fn set_next_level(&self, index: usize);

    /// Pin a level, disabling automatic selection
    fn set_current_level(&self, index: usize);

    /// Hand level selection back to the engine's ABR
    fn set_auto_level(&self);

    fn auto_level_enabled(&self) -> bool;

    /// Bits per second, `None` before the first measurement
    fn bandwidth_estimate(&self) -> Option<u64>;

    fn recover_media_error(&self);

    fn destroy(&self);
}

/// Builds engine instances
pub trait EngineFactory: Send + Sync {
    /// Whether the platform can run a software engine at all
    fn is_supported(&self) -> bool;

    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn HlsEngine>>;
}

#[derive(Default)]
struct AdapterInner {
    engine: Option<Arc<dyn HlsEngine>>,
    mode: Option<PlaybackMode>,
    /// Incremented on every initialize
    generation: u64,
    recovery_attempted: bool,
    /// Set after a fatal error; all commands become no-ops
    halted: bool,
    hevc_supported: bool,
}

/// Owns the engine instance between `initialize` and `destroy`
pub struct EngineAdapter {
    factory: Arc<dyn EngineFactory>,
    media: Arc<dyn MediaElement>,
    config: EngineConfig,
    inner: RwLock<AdapterInner>,
}

impl EngineAdapter {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        media: Arc<dyn MediaElement>,
        config: EngineConfig,
    ) -> Self {
        Self {
            factory,
            media,
            config,
            inner: RwLock::new(AdapterInner::default()),
        }
    }

    /// Tear down any previous instance, then start loading `source`.
    ///
    /// The old engine is destroyed before the new one is constructed, so the
    /// media element is never attached to two engines.
    #[instrument(skip(self), fields(uri = %source.uri))]
    pub async fn initialize(&self, source: &PlaybackSource) -> Result<PlaybackMode> {
        let mut inner = self.inner.write().await;
        Self::teardown(&mut inner);
        inner.generation += 1;

        let native = supports_native_hls(self.media.as_ref());
        inner.hevc_supported = supports_hevc(self.media.as_ref());

        info!(
            native,
            hevc = inner.hevc_supported,
            generation = inner.generation,
            "Initializing playback"
        );

        if native {
            self.media.set_src(&source.uri);
            inner.mode = Some(PlaybackMode::Native);
            return Ok(PlaybackMode::Native);
        }

        if !self.factory.is_supported() {
            inner.halted = true;
            error!("Neither native HLS nor a software engine is available");
            return Err(Error::Playback(PlaybackErrorKind::Unsupported));
        }

        let engine = self.factory.create(&self.config)?;
        engine.load_source(&source.uri);
        engine.attach_media(Arc::clone(&self.media));

        inner.engine = Some(engine);
        inner.mode = Some(PlaybackMode::Engine);
        Ok(PlaybackMode::Engine)
    }

    /// Release the engine. Safe to call repeatedly.
    pub async fn destroy(&self) {
        let mut inner = self.inner.write().await;
        if inner.engine.is_some() {
            debug!(generation = inner.generation, "Destroying engine");
        }
        Self::teardown(&mut inner);
    }

    fn teardown(inner: &mut AdapterInner) {
        if let Some(engine) = inner.engine.take() {
            engine.destroy();
        }
        inner.mode = None;
        inner.recovery_attempted = false;
        inner.halted = false;
    }

    /// Stop issuing commands after a terminal error. The engine stays
    /// allocated until `destroy`.
    pub async fn halt(&self) {
        self.inner.write().await.halted = true;
    }

    /// Translate an engine event. Events arriving while no engine is active
    /// are dropped.
    pub async fn translate(&self, raw: RawEngineEvent) -> Option<EngineEvent> {
        let mut inner = self.inner.write().await;
        let engine = match (&inner.engine, inner.halted) {
            (Some(engine), false) => Arc::clone(engine),
            _ => {
                debug!(?raw, "Dropping engine event without an active engine");
                return None;
            }
        };

        match raw {
            RawEngineEvent::ManifestParsed { levels } => {
                let mut ladder: Vec<QualityLevel> = levels
                    .iter()
                    .enumerate()
                    .map(|(index, level)| {
                        let bitrate = (level.bitrate > 0).then_some(level.bitrate);
                        QualityLevel::new(index, level.height, bitrate)
                    })
                    .collect();
                sort_ladder(&mut ladder);
                debug!(levels = ladder.len(), "Manifest parsed");
                Some(EngineEvent::Ready(ladder))
            }
            RawEngineEvent::LevelSwitching { level } => Some(EngineEvent::LevelSwitching(level)),
            RawEngineEvent::LevelSwitched { level } => Some(EngineEvent::LevelSwitched(level)),
            RawEngineEvent::Error(data) => Some(Self::classify(&mut inner, &engine, data)),
        }
    }

    fn classify(
        inner: &mut AdapterInner,
        engine: &Arc<dyn HlsEngine>,
        data: EngineErrorData,
    ) -> EngineEvent {
        let codec = PlaybackErrorKind::CodecIncompatible {
            hevc_supported: inner.hevc_supported,
        };

        if !data.fatal {
            let kind = match (&data.details, data.error_type) {
                (EngineErrorDetails::ManifestIncompatibleCodecs, _) => codec,
                (EngineErrorDetails::BufferStalled, _) => PlaybackErrorKind::PlaybackStalled,
                (_, EngineErrorType::Network) => PlaybackErrorKind::Network,
                (_, EngineErrorType::Media) => PlaybackErrorKind::Media,
                _ => PlaybackErrorKind::Other,
            };
            debug!(?data, "Non-fatal engine error");
            return EngineEvent::RecoverableError(kind);
        }

        let kind = match (&data.details, data.error_type) {
            (EngineErrorDetails::ManifestIncompatibleCodecs, _) => codec,
            (EngineErrorDetails::BufferStalled, EngineErrorType::Media) => {
                PlaybackErrorKind::PlaybackStalled
            }
            (_, EngineErrorType::Media) => {
                if !inner.recovery_attempted {
                    inner.recovery_attempted = true;
                    warn!(details = ?data.details, "Attempting to recover from media error");
                    engine.recover_media_error();
                    return EngineEvent::RecoverableError(PlaybackErrorKind::Media);
                }
                PlaybackErrorKind::Media
            }
            (_, EngineErrorType::Network) => PlaybackErrorKind::Network,
            _ => {
                engine.destroy();
                inner.engine = None;
                PlaybackErrorKind::Other
            }
        };

        inner.halted = true;
        error!(kind = %kind, ?data, "Fatal engine error");
        EngineEvent::FatalError(kind)
    }

    async fn engine(&self) -> Option<Arc<dyn HlsEngine>> {
        let inner = self.inner.read().await;
        if inner.halted {
            return None;
        }
        inner.engine.clone()
    }

    /// Returns false when no engine accepted the command
    pub async fn set_next_level(&self, index: usize) -> bool {
        match self.engine().await {
            Some(engine) => {
                engine.set_next_level(index);
                true
            }
            None => false,
        }
    }

    pub async fn set_current_level(&self, index: usize) -> bool {
        match self.engine().await {
            Some(engine) => {
                engine.set_current_level(index);
                true
            }
            None => false,
        }
    }

    pub async fn set_auto_level(&self) -> bool {
        match self.engine().await {
            Some(engine) => {
                engine.set_auto_level();
                true
            }
            None => false,
        }
    }

    pub async fn auto_level_enabled(&self) -> bool {
        self.engine().await.map(|e| e.auto_level_enabled()).unwrap_or(false)
    }

    pub async fn bandwidth_estimate(&self) -> Option<u64> {
        self.engine().await.and_then(|e| e.bandwidth_estimate())
    }

    /// Engine-reported level list, empty in native mode
    pub async fn engine_levels(&self) -> Vec<EngineLevel> {
        self.engine().await.map(|e| e.levels()).unwrap_or_default()
    }

    pub async fn mode(&self) -> Option<PlaybackMode> {
        self.inner.read().await.mode
    }

    /// A software engine exists and accepts commands
    pub async fn is_active(&self) -> bool {
        self.engine().await.is_some()
    }

    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{EngineCall, ScriptedEngineFactory, SimulatedMedia};

    fn ladder() -> Vec<EngineLevel> {
        vec![
            EngineLevel { height: Some(720), width: Some(1280), bitrate: 2_500_000, codecs: None },
            EngineLevel { height: Some(1080), width: Some(1920), bitrate: 5_000_000, codecs: None },
        ]
    }

    fn adapter(native: bool) -> (Arc<ScriptedEngineFactory>, Arc<SimulatedMedia>, EngineAdapter) {
        let factory = Arc::new(ScriptedEngineFactory::new(ladder()));
        let media = Arc::new(SimulatedMedia::new().with_native_hls(native));
        let adapter = EngineAdapter::new(factory.clone(), media.clone(), EngineConfig::default());
        (factory, media, adapter)
    }

    fn fatal(error_type: EngineErrorType, details: EngineErrorDetails) -> RawEngineEvent {
        RawEngineEvent::Error(EngineErrorData { error_type, details, fatal: true })
    }

    #[tokio::test]
    async fn test_initialize_replaces_previous_engine() {
        let (factory, _media, adapter) = adapter(false);
        let source = PlaybackSource::new("https://cdn.example.com/a/master.m3u8");

        assert_eq!(adapter.initialize(&source).await.unwrap(), PlaybackMode::Engine);
        let first = factory.last().unwrap();
        assert_eq!(adapter.initialize(&source).await.unwrap(), PlaybackMode::Engine);

        assert!(first.is_destroyed());
        assert_eq!(factory.created_count(), 2);
        assert_eq!(adapter.generation().await, 2);
        assert_eq!(
            factory.last().unwrap().calls(),
            vec![EngineCall::LoadSource(source.uri.clone()), EngineCall::AttachMedia]
        );
    }

    #[tokio::test]
    async fn test_native_playback_skips_engine() {
        let (factory, media, adapter) = adapter(true);
        let source = PlaybackSource::new("https://cdn.example.com/a/master.m3u8");

        assert_eq!(adapter.initialize(&source).await.unwrap(), PlaybackMode::Native);
        assert_eq!(factory.created_count(), 0);
        assert_eq!(media.src().as_deref(), Some(source.uri.as_str()));
        assert!(!adapter.is_active().await);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let factory = Arc::new(ScriptedEngineFactory::new(ladder()).unsupported());
        let media = Arc::new(SimulatedMedia::new());
        let adapter = EngineAdapter::new(factory, media, EngineConfig::default());

        let err = adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap_err();
        assert!(matches!(err, Error::Playback(PlaybackErrorKind::Unsupported)));
    }

    #[tokio::test]
    async fn test_manifest_levels_sorted() {
        let (_factory, _media, adapter) = adapter(false);
        adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap();

        let event = adapter.translate(RawEngineEvent::ManifestParsed { levels: ladder() }).await;
        match event {
            Some(EngineEvent::Ready(levels)) => {
                assert_eq!(levels[0].index, 1);
                assert_eq!(levels[0].label, "1080p (5000 kbps)");
                assert_eq!(levels[1].index, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_media_error_recovers_once_then_escalates() {
        let (factory, _media, adapter) = adapter(false);
        adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap();
        let engine = factory.last().unwrap();

        let decode = || {
            fatal(EngineErrorType::Media, EngineErrorDetails::Other("bufferAppendError".into()))
        };

        assert_eq!(
            adapter.translate(decode()).await,
            Some(EngineEvent::RecoverableError(PlaybackErrorKind::Media))
        );
        assert!(engine.calls().contains(&EngineCall::RecoverMediaError));

        assert_eq!(
            adapter.translate(decode()).await,
            Some(EngineEvent::FatalError(PlaybackErrorKind::Media))
        );
        let recoveries = engine
            .calls()
            .iter()
            .filter(|c| **c == EngineCall::RecoverMediaError)
            .count();
        assert_eq!(recoveries, 1);
    }

    #[tokio::test]
    async fn test_codec_error_is_terminal_and_halts_commands() {
        let (factory, _media, adapter) = adapter(false);
        adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap();
        let engine = factory.last().unwrap();

        let codecs = fatal(EngineErrorType::Media, EngineErrorDetails::ManifestIncompatibleCodecs);
        let event = adapter.translate(codecs).await;
        let kind = PlaybackErrorKind::CodecIncompatible { hevc_supported: false };
        assert_eq!(event, Some(EngineEvent::FatalError(kind)));

        let before = engine.calls().len();
        assert!(!adapter.set_current_level(0).await);
        assert!(!adapter.set_auto_level().await);
        assert_eq!(engine.calls().len(), before);
        assert!(adapter.translate(RawEngineEvent::LevelSwitched { level: 0 }).await.is_none());
    }

    #[tokio::test]
    async fn test_network_error_not_retried() {
        let (factory, _media, adapter) = adapter(false);
        adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap();

        let manifest = EngineErrorDetails::Other("manifestLoadError".into());
        let event = adapter.translate(fatal(EngineErrorType::Network, manifest)).await;
        assert_eq!(event, Some(EngineEvent::FatalError(PlaybackErrorKind::Network)));
        assert!(!factory.last().unwrap().calls().contains(&EngineCall::RecoverMediaError));
    }

    #[tokio::test]
    async fn test_unknown_fatal_destroys_engine() {
        let (factory, _media, adapter) = adapter(false);
        adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap();

        let internal = EngineErrorDetails::Other("internalException".into());
        let event = adapter.translate(fatal(EngineErrorType::Other, internal)).await;
        assert_eq!(event, Some(EngineEvent::FatalError(PlaybackErrorKind::Other)));
        assert!(factory.last().unwrap().is_destroyed());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (factory, _media, adapter) = adapter(false);
        adapter.initialize(&PlaybackSource::new("x.m3u8")).await.unwrap();

        adapter.destroy().await;
        adapter.destroy().await;

        let destroys = factory
            .last()
            .unwrap()
            .calls()
            .iter()
            .filter(|c| **c == EngineCall::Destroy)
            .count();
        assert_eq!(destroys, 1);
        assert!(adapter.translate(RawEngineEvent::LevelSwitching { level: 0 }).await.is_none());
    }
}
