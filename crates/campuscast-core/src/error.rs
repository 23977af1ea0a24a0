//! Error types for CampusCast Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classified playback failure reported by the engine adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    /// The manifest requires a codec this runtime cannot decode
    CodecIncompatible {
        /// Whether any HEVC profile reported as playable
        hevc_supported: bool,
    },
    /// The engine gave up on a stalled buffer
    PlaybackStalled,
    /// Decode or buffer fault inside the engine
    Media,
    /// Manifest, playlist or segment download failure
    Network,
    /// Neither native playback nor a software engine is available
    Unsupported,
    /// The software engine could not be constructed
    EngineUnavailable,
    /// Anything the engine could not classify
    Other,
}

impl PlaybackErrorKind {
    /// User-facing hint shown in place of the player surface
    pub fn message(&self) -> &'static str {
        match self {
            PlaybackErrorKind::CodecIncompatible { hevc_supported: false } => {
                "H.265/HEVC codec not supported. Please try a different browser with hardware \
                 acceleration enabled, or use Chrome 107+ / Edge 107+."
            }
            PlaybackErrorKind::CodecIncompatible { hevc_supported: true } => {
                "Video codec incompatible. The video format may not be supported."
            }
            PlaybackErrorKind::PlaybackStalled => {
                "Video playback stalled. This may be due to insufficient hardware decoding \
                 support for H.265."
            }
            PlaybackErrorKind::Media => {
                "A media error occurred and playback could not be recovered."
            }
            PlaybackErrorKind::Network => "Network error occurred. Please check your connection.",
            PlaybackErrorKind::Unsupported => "HLS is not supported in this browser.",
            PlaybackErrorKind::EngineUnavailable => {
                "The video player could not be started. Please reload the page."
            }
            PlaybackErrorKind::Other => {
                "A fatal error occurred during playback. This may be due to codec \
                 compatibility issues."
            }
        }
    }

    /// Stable code for logs and host callbacks
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackErrorKind::CodecIncompatible { .. } => "CODEC_INCOMPATIBLE",
            PlaybackErrorKind::PlaybackStalled => "PLAYBACK_STALLED",
            PlaybackErrorKind::Media => "MEDIA",
            PlaybackErrorKind::Network => "NETWORK",
            PlaybackErrorKind::Unsupported => "UNSUPPORTED",
            PlaybackErrorKind::EngineUnavailable => "ENGINE_UNAVAILABLE",
            PlaybackErrorKind::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for PlaybackErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Source resolution errors
    #[error("Failed to fetch content detail: {0}")]
    SourceFetch(#[from] reqwest::Error),

    #[error("Backend returned status {status} for {url}")]
    SourceStatus { status: u16, url: String },

    #[error("Failed to decode content detail: {0}")]
    SourceDecode(#[from] serde_json::Error),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Content {content_id} failed processing")]
    SourceFailed {
        content_id: String,
        detail: Option<String>,
    },

    #[error("Content is not ready for playback (status: {status})")]
    SourceNotReady { status: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // Engine errors
    #[error("Failed to create playback engine: {0}")]
    EngineCreate(String),

    #[error("Playback failed: {0}")]
    Playback(PlaybackErrorKind),

    // Control errors
    #[error("Play request rejected: {0}")]
    PlayRejected(String),

    #[error("Quality level {index} out of range ({available} available)")]
    LevelOutOfRange { index: usize, available: usize },

    #[error("Player is detached from its media element")]
    Detached,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::SourceFetch(_) | Error::PlayRejected(_) | Error::SourceNotReady { .. } => true,
            Error::SourceStatus { status, .. } => matches!(status, 502..=504),
            Error::Playback(kind) => matches!(kind, PlaybackErrorKind::Media),
            _ => false,
        }
    }

    /// Returns the error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::SourceFetch(_) => "SOURCE_FETCH",
            Error::SourceStatus { .. } => "SOURCE_STATUS",
            Error::SourceDecode(_) => "SOURCE_DECODE",
            Error::ContentNotFound(_) => "CONTENT_NOT_FOUND",
            Error::SourceFailed { .. } => "SOURCE_FAILED",
            Error::SourceNotReady { .. } => "SOURCE_NOT_READY",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::EngineCreate(_) => "ENGINE_CREATE",
            Error::Playback(kind) => kind.code(),
            Error::PlayRejected(_) => "PLAY_REJECTED",
            Error::LevelOutOfRange { .. } => "LEVEL_OUT_OF_RANGE",
            Error::Detached => "DETACHED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL",
        }
    }
}
