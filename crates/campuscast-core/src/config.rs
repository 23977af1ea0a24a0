//! Player configuration
//!
//! Declarative knobs the host sets before mounting. Defaults carry the
//! deployment's HEVC VOD buffer and ABR tuning.

use crate::types::QualityPreference;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Media element preload hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preload {
    None,
    #[default]
    Metadata,
    Auto,
}

/// Tuning handed to the software engine on creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Offload demuxing to a worker when the engine supports it
    pub enable_worker: bool,
    /// Never pick a level larger than the rendered player
    pub cap_level_to_player_size: bool,
    /// First level to load, `None` lets the engine decide
    pub start_level: Option<usize>,
    pub low_latency: bool,
    /// Forward buffer target (seconds)
    pub max_buffer_length: f64,
    /// Hard ceiling for the forward buffer (seconds)
    pub max_max_buffer_length: f64,
    /// Forward buffer size cap (bytes)
    pub max_buffer_size: u64,
    /// Largest gap the engine jumps over (seconds)
    pub max_buffer_hole: f64,
    /// Buffer kept behind the playhead (seconds)
    pub back_buffer_length: f64,
    pub manifest_loading_timeout_ms: u64,
    pub manifest_loading_max_retry: u32,
    pub level_loading_timeout_ms: u64,
    pub level_loading_max_retry: u32,
    pub frag_loading_timeout_ms: u64,
    pub frag_loading_max_retry: u32,
    /// Bandwidth estimate before any measurement (bps)
    pub abr_ewma_default_estimate: u64,
    pub abr_bandwidth_factor: f64,
    /// Applied when considering an upgrade; lower means slower upgrades
    pub abr_bandwidth_up_factor: f64,
    pub nudge_offset: f64,
    pub nudge_max_retry: u32,
    pub max_frag_lookup_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::vod()
    }
}

impl EngineConfig {
    /// Deep buffers and conservative upgrades, tolerant of slow HEVC decode paths
    pub fn vod() -> Self {
        Self {
            enable_worker: true,
            cap_level_to_player_size: true,
            start_level: None,
            low_latency: false,
            max_buffer_length: 20.0,
            max_max_buffer_length: 300.0,
            max_buffer_size: 40 * 1000 * 1000,
            max_buffer_hole: 0.8,
            back_buffer_length: 15.0,
            manifest_loading_timeout_ms: 10_000,
            manifest_loading_max_retry: 4,
            level_loading_timeout_ms: 10_000,
            level_loading_max_retry: 4,
            frag_loading_timeout_ms: 20_000,
            frag_loading_max_retry: 6,
            abr_ewma_default_estimate: 500_000,
            abr_bandwidth_factor: 0.8,
            abr_bandwidth_up_factor: 0.6,
            nudge_offset: 0.05,
            nudge_max_retry: 5,
            max_frag_lookup_tolerance: 0.5,
        }
    }

    /// Short buffers for live sources
    pub fn low_latency() -> Self {
        Self {
            low_latency: true,
            max_buffer_length: 6.0,
            max_max_buffer_length: 12.0,
            back_buffer_length: 5.0,
            ..Self::vod()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_length <= 0.0 {
            return Err(Error::InvalidConfig("max_buffer_length must be positive".into()));
        }
        if self.max_max_buffer_length < self.max_buffer_length {
            return Err(Error::InvalidConfig(
                "max_max_buffer_length must be at least max_buffer_length".into(),
            ));
        }
        for (name, factor) in [
            ("abr_bandwidth_factor", self.abr_bandwidth_factor),
            ("abr_bandwidth_up_factor", self.abr_bandwidth_up_factor),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(Error::InvalidConfig(format!("{} must be in (0, 1]", name)));
            }
        }
        Ok(())
    }
}

/// Timing constants of the quality switch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchTuning {
    /// Buffered-ahead seconds above which playback resumes right after commit
    pub continuity_threshold_sec: f64,
    /// Buffered-ahead seconds the resume poll waits for
    pub resume_threshold_sec: f64,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Gap between the preload hint and the level commit
    #[serde(with = "millis")]
    pub commit_delay: Duration,
}

impl Default for SwitchTuning {
    fn default() -> Self {
        Self {
            continuity_threshold_sec: 3.0,
            resume_threshold_sec: 2.0,
            poll_interval: Duration::from_millis(100),
            commit_delay: Duration::from_millis(50),
        }
    }
}

/// Timing constants of the input coordinator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputTimings {
    /// Window in which a second click turns into a double click
    #[serde(with = "millis")]
    pub double_click_window: Duration,
    /// Keyboard play/pause debounce, absorbs key repeat
    #[serde(with = "millis")]
    pub key_debounce: Duration,
    /// Pointer inactivity before controls hide in fullscreen
    #[serde(with = "millis")]
    pub controls_hide_after: Duration,
    pub seek_step_sec: f64,
    pub volume_step: f64,
}

impl Default for InputTimings {
    fn default() -> Self {
        Self {
            double_click_window: Duration::from_millis(250),
            key_debounce: Duration::from_millis(200),
            controls_hide_after: Duration::from_secs(3),
            seek_step_sec: 5.0,
            volume_step: 0.1,
        }
    }
}

/// Declarative player options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    pub autoplay: bool,
    pub muted: bool,
    pub plays_inline: bool,
    pub preload: Preload,
    /// Applied once the manifest is parsed
    pub initial_quality: QualityPreference,
    pub engine: EngineConfig,
    pub switch: SwitchTuning,
    pub input: InputTimings,
    /// Telemetry sampling period
    #[serde(with = "millis")]
    pub stats_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            autoplay: false,
            muted: false,
            plays_inline: true,
            preload: Preload::Metadata,
            initial_quality: QualityPreference::Auto,
            engine: EngineConfig::default(),
            switch: SwitchTuning::default(),
            input: InputTimings::default(),
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl PlayerOptions {
    /// Parse options from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: PlayerOptions =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.switch.resume_threshold_sec > self.switch.continuity_threshold_sec {
            return Err(Error::InvalidConfig(
                "resume threshold must not exceed continuity threshold".into(),
            ));
        }
        if self.stats_interval.is_zero() {
            return Err(Error::InvalidConfig("stats_interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// `Duration` as integer milliseconds on the wire
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
