//! Playback transport controls
//!
//! Thin operations on the media element. No state is kept here; everything
//! the UI shows is read back from the element after its events fire.

use crate::media::MediaElement;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Round to three decimals so repeated ±0.1 steps land on exact values
fn round_volume(volume: f64) -> f64 {
    (volume * 1000.0).round() / 1000.0
}

/// Play, pause, seek and volume on one media element
#[derive(Clone)]
pub struct Transport {
    media: Arc<dyn MediaElement>,
}

impl Transport {
    pub fn new(media: Arc<dyn MediaElement>) -> Self {
        Self { media }
    }

    pub fn media(&self) -> &Arc<dyn MediaElement> {
        &self.media
    }

    /// Start playback, propagating a rejection to the caller
    pub async fn play(&self) -> Result<()> {
        self.media.play().await
    }

    /// Start playback; a rejection is logged and swallowed
    pub async fn play_or_log(&self) {
        if let Err(e) = self.media.play().await {
            warn!(error = %e, "play() rejected");
        }
    }

    pub fn pause(&self) {
        self.media.pause();
    }

    pub async fn toggle_play_pause(&self) {
        if self.media.is_paused() {
            self.play_or_log().await;
        } else {
            self.media.pause();
        }
    }

    pub fn toggle_mute(&self) {
        self.media.set_muted(!self.media.is_muted());
    }

    /// Seek by `delta_sec` from the current position
    pub fn seek_relative(&self, delta_sec: f64) {
        self.seek_to(self.media.current_time() + delta_sec);
    }

    /// Seek to `position_sec`, clamped to `[0, duration]`.
    /// An unknown duration only clamps the lower bound.
    pub fn seek_to(&self, position_sec: f64) {
        let duration = self.media.duration();
        let upper = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            f64::INFINITY
        };
        let target = position_sec.clamp(0.0, upper);
        debug!(target, "Seek");
        self.media.set_current_time(target);
    }

    pub fn adjust_volume(&self, delta: f64) {
        self.set_volume(self.media.volume() + delta);
    }

    /// Set volume in `[0, 1]`; exactly zero mutes, anything else unmutes
    pub fn set_volume(&self, volume: f64) {
        if !volume.is_finite() {
            debug!(volume, "Ignoring non-finite volume");
            return;
        }
        let volume = round_volume(volume.clamp(0.0, 1.0));
        self.media.set_volume(volume);
        self.media.set_muted(volume == 0.0);
    }
}
