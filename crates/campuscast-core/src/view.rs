//! Control surface view model
//!
//! A plain snapshot of everything the rendered controls show. The player
//! rebuilds it after each handled event and publishes it on a watch channel.

use crate::types::{PlaybackClock, PlaybackMode, PlayerStatus, QualityLevel, QualitySelection};
use serde::{Deserialize, Serialize};

/// `m:ss`, minutes unbounded. Non-finite or negative input renders as `0:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// One row of the quality menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    /// `None` for the auto row
    pub level_index: Option<usize>,
    pub label: String,
    pub selected: bool,
}

/// Quality menu contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "entries")]
pub enum QualityMenu {
    /// The platform runs its own ABR; no menu, only a static label
    Native,
    /// Levels are not known yet
    Pending,
    /// Auto row first, then the levels in display order
    Levels(Vec<MenuEntry>),
}

impl QualityMenu {
    pub fn build(
        mode: Option<PlaybackMode>,
        levels: &[QualityLevel],
        selection: QualitySelection,
        actual_level: Option<usize>,
    ) -> Self {
        if mode == Some(PlaybackMode::Native) {
            return QualityMenu::Native;
        }
        if levels.is_empty() {
            return QualityMenu::Pending;
        }

        let auto = selection == QualitySelection::Auto;
        let playing_height = actual_level
            .and_then(|actual| levels.iter().find(|l| l.index == actual))
            .and_then(|l| l.height_px);
        let auto_label = match (auto, playing_height) {
            (true, Some(height)) => format!("Auto • {}p", height),
            _ => "Auto".to_string(),
        };

        let mut entries = Vec::with_capacity(levels.len() + 1);
        entries.push(MenuEntry {
            level_index: None,
            label: auto_label,
            selected: auto,
        });
        entries.extend(levels.iter().map(|level| MenuEntry {
            level_index: Some(level.index),
            label: level.label.clone(),
            selected: selection == QualitySelection::Manual(level.index),
        }));
        QualityMenu::Levels(entries)
    }

    /// Label shown in place of the menu when it has no rows
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            QualityMenu::Native => Some("Auto (system)"),
            QualityMenu::Pending => Some("Loading..."),
            QualityMenu::Levels(_) => None,
        }
    }
}

/// Everything the control surface renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub status: PlayerStatus,
    pub poster_uri: Option<String>,
    /// Loading overlay
    pub loading: bool,
    /// Quality switch indicator, hidden under the loading overlay
    pub switching: bool,
    pub playing: bool,
    pub clock: PlaybackClock,
    pub elapsed_label: String,
    pub total_label: String,
    pub volume: f64,
    pub muted: bool,
    pub quality_menu: QualityMenu,
    pub fullscreen: bool,
    pub controls_visible: bool,
    /// Cursor hidden together with the controls in fullscreen
    pub cursor_hidden: bool,
    /// Terminal error replacing the player surface
    pub error_message: Option<String>,
}

impl Default for PlayerView {
    fn default() -> Self {
        Self {
            status: PlayerStatus::Idle,
            poster_uri: None,
            loading: true,
            switching: false,
            playing: false,
            clock: PlaybackClock::default(),
            elapsed_label: format_time(0.0),
            total_label: format_time(0.0),
            volume: 1.0,
            muted: false,
            quality_menu: QualityMenu::Pending,
            fullscreen: false,
            controls_visible: true,
            cursor_hidden: false,
            error_message: None,
        }
    }
}
