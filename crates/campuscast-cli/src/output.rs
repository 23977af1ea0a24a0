//! Output formatting for CLI

use campuscast_core::view::MenuEntry;
use campuscast_core::QualityLevel;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON; serialization failures render as an empty object
pub fn format_output<T: Serialize>(data: &T, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => serde_json::to_value(data).unwrap_or_default().to_string(),
    }
}

#[derive(Tabled)]
struct LevelRow {
    #[tabled(rename = "Level")]
    index: usize,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Height")]
    height: String,
    #[tabled(rename = "Bitrate")]
    bitrate: String,
    #[tabled(rename = "Selected")]
    selected: &'static str,
}

/// Ladder table in display order, marking the selected menu row
pub fn levels_table(levels: &[QualityLevel], menu: &[MenuEntry]) -> String {
    let rows = levels.iter().map(|level| {
        let selected = menu
            .iter()
            .any(|entry| entry.level_index == Some(level.index) && entry.selected);
        LevelRow {
            index: level.index,
            label: level.label.clone(),
            height: level.height_px.map(|h| format!("{}p", h)).unwrap_or_else(|| "-".into()),
            bitrate: level
                .bitrate_kbps
                .map(|kbps| format!("{} kbps", kbps))
                .unwrap_or_else(|| "-".into()),
            selected: if selected { "*" } else { "" },
        }
    });
    Table::new(rows).to_string()
}
