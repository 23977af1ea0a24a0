//! Media element seam
//!
//! The player exclusively owns one media element for its mounted lifetime.
//! The engine adapter is the only writer of its source, transport controls
//! are the only writer of play state, volume and position.

use crate::config::Preload;
use crate::types::PlaybackClock;
use crate::Result;
use async_trait::async_trait;

/// MIME type a platform with built-in HLS support reports as playable
pub const NATIVE_HLS_MIME: &str = "application/vnd.apple.mpegurl";

/// HEVC profiles checked before explaining a codec failure
pub const HEVC_CANDIDATES: [&str; 3] = [
    "video/mp4; codecs=\"hvc1.1.6.L93.B0\"",
    "video/mp4; codecs=\"hev1.1.6.L93.B0\"",
    "video/mp4; codecs=\"hvc1\"",
];

/// The host's video element
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Whether the platform reports this MIME/codec string as playable
    fn can_play_type(&self, mime: &str) -> bool;

    /// Point the element at a source the platform plays natively
    fn set_src(&self, uri: &str);

    fn set_preload(&self, preload: Preload);

    /// Play inside the page instead of the platform's fullscreen player
    fn set_plays_inline(&self, inline: bool);

    fn is_paused(&self) -> bool;

    /// Start playback. May be rejected, e.g. by an autoplay policy.
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    /// Duration in seconds, NaN or zero until metadata is known
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    /// End of the last buffered range, `None` when nothing is buffered
    fn buffered_end(&self) -> Option<f64>;
}

/// Events the element fires, forwarded by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    LoadStart,
    CanPlay,
    Play,
    Pause,
    Ended,
    TimeUpdate,
    DurationChange,
    VolumeChange,
}

/// Seconds buffered beyond the playhead, zero when nothing is buffered
pub fn buffered_ahead(media: &dyn MediaElement) -> f64 {
    media
        .buffered_end()
        .map(|end| (end - media.current_time()).max(0.0))
        .unwrap_or(0.0)
}

/// Snapshot the element's clock
pub fn clock(media: &dyn MediaElement) -> PlaybackClock {
    let duration = media.duration();
    PlaybackClock {
        current_time_sec: media.current_time(),
        duration_sec: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
        buffered_end_sec: media.buffered_end().unwrap_or(0.0),
        buffered_ahead_sec: buffered_ahead(media),
    }
}

pub fn supports_native_hls(media: &dyn MediaElement) -> bool {
    media.can_play_type(NATIVE_HLS_MIME)
}

pub fn supports_hevc(media: &dyn MediaElement) -> bool {
    HEVC_CANDIDATES.iter().any(|codec| media.can_play_type(codec))
}
