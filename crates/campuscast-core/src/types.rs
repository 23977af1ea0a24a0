//! Core types for CampusCast

use crate::error::PlaybackErrorKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a mounted player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the player is asked to play. Replaced, never mutated, on source change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSource {
    /// Manifest URI
    pub uri: String,
    /// Poster image URI
    pub poster_uri: Option<String>,
}

impl PlaybackSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            poster_uri: None,
        }
    }

    pub fn with_poster(mut self, poster_uri: impl Into<String>) -> Self {
        self.poster_uri = Some(poster_uri.into());
        self
    }
}

/// One rendition of the loaded manifest, as shown in the quality menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityLevel {
    /// Index into the engine's own level list
    pub index: usize,
    /// Vertical resolution in pixels
    pub height_px: Option<u32>,
    /// Bitrate in kbps
    pub bitrate_kbps: Option<u32>,
    /// Menu label
    pub label: String,
}

impl QualityLevel {
    /// Build a level from engine-reported height and bitrate (bits per second)
    pub fn new(index: usize, height_px: Option<u32>, bitrate_bps: Option<u64>) -> Self {
        let bitrate_kbps = bitrate_bps.map(|b| ((b as f64) / 1000.0).round() as u32);
        Self {
            index,
            height_px,
            bitrate_kbps,
            label: quality_label(index, height_px, bitrate_kbps),
        }
    }
}

/// Menu label: `720p (2500 kbps)`, or `Quality 3 (800 kbps)` when height is unknown
pub fn quality_label(index: usize, height_px: Option<u32>, bitrate_kbps: Option<u32>) -> String {
    let bitrate = match bitrate_kbps {
        Some(kbps) if kbps > 0 => format!(" ({} kbps)", kbps),
        _ => String::new(),
    };
    match height_px {
        Some(h) if h > 0 => format!("{}p{}", h, bitrate),
        _ => format!("Quality {}{}", index + 1, bitrate),
    }
}

/// Order levels for display: height descending, then bitrate descending.
/// Levels without a height sort after those with one.
pub fn sort_ladder(levels: &mut [QualityLevel]) {
    levels.sort_by(|a, b| {
        b.height_px
            .unwrap_or(0)
            .cmp(&a.height_px.unwrap_or(0))
            .then_with(|| b.bitrate_kbps.unwrap_or(0).cmp(&a.bitrate_kbps.unwrap_or(0)))
    });
}

/// Level whose height matches exactly, otherwise the closest one.
/// Levels without a height are never picked.
pub fn closest_by_height(levels: &[QualityLevel], height: u32) -> Option<&QualityLevel> {
    if let Some(exact) = levels.iter().find(|l| l.height_px == Some(height)) {
        return Some(exact);
    }

    levels
        .iter()
        .filter_map(|l| l.height_px.map(|h| (l, h.abs_diff(height))))
        .fold(None, |best: Option<(&QualityLevel, u32)>, (level, diff)| match best {
            Some((_, best_diff)) if best_diff <= diff => best,
            _ => Some((level, diff)),
        })
        .map(|(level, _)| level)
}

/// Quality requested by the host or the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityPreference {
    /// Let the engine choose
    #[default]
    Auto,
    /// Pin an engine level index
    LevelIndex(usize),
    /// Pin the level closest to this height
    Height(u32),
}

/// The user's quality selection. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualitySelection {
    Auto,
    Manual(usize),
}

impl QualitySelection {
    /// Pinned level index, `None` in auto mode
    pub fn level(&self) -> Option<usize> {
        match self {
            QualitySelection::Auto => None,
            QualitySelection::Manual(index) => Some(*index),
        }
    }
}

impl std::fmt::Display for QualitySelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualitySelection::Auto => write!(f, "auto"),
            QualitySelection::Manual(index) => write!(f, "manual({})", index),
        }
    }
}

/// Quality state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityState {
    /// Engine picks the level
    Auto,
    /// A manual switch to this level is being committed
    Switching(usize),
    /// Pinned to this level
    Manual(usize),
}

impl std::fmt::Display for QualityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityState::Auto => write!(f, "auto"),
            QualityState::Switching(index) => write!(f, "switching({})", index),
            QualityState::Manual(index) => write!(f, "manual({})", index),
        }
    }
}

/// Playback position snapshot derived from the media element
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackClock {
    pub current_time_sec: f64,
    /// `0.0` until the element knows the duration
    pub duration_sec: f64,
    /// End of the last buffered range
    pub buffered_end_sec: f64,
    /// Seconds buffered beyond the current position
    pub buffered_ahead_sec: f64,
}

impl PlaybackClock {
    /// Played fraction of the progress bar
    pub fn played_fraction(&self) -> f64 {
        fraction(self.current_time_sec, self.duration_sec)
    }

    /// Buffered fraction of the progress bar
    pub fn buffered_fraction(&self) -> f64 {
        fraction(self.buffered_end_sec, self.duration_sec)
    }
}

fn fraction(value: f64, duration: f64) -> f64 {
    if duration > 0.0 && duration.is_finite() {
        (value / duration).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Payload of the quality-changed callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityChange {
    pub level_index: usize,
    pub height: Option<u32>,
    pub bitrate_kbps: Option<u32>,
}

/// Periodic telemetry sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSample {
    pub bandwidth_kbps: Option<u64>,
    pub buffer_sec: f64,
}

/// A classified error forwarded to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackError {
    pub kind: PlaybackErrorKind,
    /// Fatal errors replace the player surface
    pub fatal: bool,
}

/// How the current source is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// The platform plays HLS itself and runs its own ABR
    Native,
    /// A software engine drives the media element
    Engine,
}

/// Player lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    /// Mounted, nothing loaded
    Idle,
    /// Source handed to the engine, manifest not parsed yet
    Loading,
    /// Manifest parsed (or native playback attached)
    Ready,
    /// Terminal playback error
    Failed(PlaybackErrorKind),
    /// Torn down; the handle is inert
    Destroyed,
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerStatus::Idle => write!(f, "idle"),
            PlayerStatus::Loading => write!(f, "loading"),
            PlayerStatus::Ready => write!(f, "ready"),
            PlayerStatus::Failed(kind) => write!(f, "failed({})", kind),
            PlayerStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}
