//! Input & Fullscreen Coordinator
//!
//! Turns raw pointer and keyboard input into transport and fullscreen
//! actions:
//!
//! - clicks are counted inside a short window; when the window closes, one
//!   click toggles play/pause and two toggle fullscreen
//! - keyboard shortcuts are ignored while focus is in a text field or on the
//!   media element itself, and the play/pause key is debounced
//! - in fullscreen the controls hide after a period without pointer movement
//!
//! Fullscreen is only considered entered or exited once the platform reports
//! it through [`InputCoordinator::handle_fullscreen_change`].

use crate::config::InputTimings;
use crate::task::TaskSlot;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Host side of fullscreen. Requests may be denied, so the result arrives
/// later as a fullscreen-change notification.
pub trait FullscreenHost: Send + Sync {
    fn request_fullscreen(&self);
    fn exit_fullscreen(&self);
}

/// Where a click landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickTarget {
    /// The video surface
    Video,
    /// The control bar; clicks there never reach the click counter
    Controls,
}

/// Element holding keyboard focus when a key is pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Focus {
    #[default]
    Page,
    /// Text input or text area
    TextInput,
    /// The media element itself, which handles its own keys
    MediaElement,
}

/// Keys with a shortcut binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Space,
    K,
    M,
    F,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

impl Key {
    /// Parse a DOM `KeyboardEvent.code`
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Space" => Some(Key::Space),
            "KeyK" => Some(Key::K),
            "KeyM" => Some(Key::M),
            "KeyF" => Some(Key::F),
            "ArrowLeft" => Some(Key::ArrowLeft),
            "ArrowRight" => Some(Key::ArrowRight),
            "ArrowUp" => Some(Key::ArrowUp),
            "ArrowDown" => Some(Key::ArrowDown),
            _ => None,
        }
    }
}

/// Action a shortcut maps to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    TogglePlay,
    ToggleMute,
    ToggleFullscreen,
    Seek(f64),
    Volume(f64),
}

fn shortcut(key: Key, timings: &InputTimings) -> InputAction {
    match key {
        Key::Space | Key::K => InputAction::TogglePlay,
        Key::M => InputAction::ToggleMute,
        Key::F => InputAction::ToggleFullscreen,
        Key::ArrowLeft => InputAction::Seek(-timings.seek_step_sec),
        Key::ArrowRight => InputAction::Seek(timings.seek_step_sec),
        Key::ArrowUp => InputAction::Volume(timings.volume_step),
        Key::ArrowDown => InputAction::Volume(-timings.volume_step),
    }
}

#[derive(Debug, Default)]
struct InputState {
    clicks: u32,
    fullscreen: bool,
    last_key_toggle: Option<Instant>,
}

fn lock(state: &Mutex<InputState>) -> MutexGuard<'_, InputState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn toggle_fullscreen(host: &dyn FullscreenHost, fullscreen: bool) {
    if fullscreen {
        host.exit_fullscreen();
    } else {
        host.request_fullscreen();
    }
}

/// Owns click counting, shortcut dispatch and controls visibility
pub struct InputCoordinator {
    transport: Transport,
    host: Arc<dyn FullscreenHost>,
    timings: InputTimings,
    state: Arc<Mutex<InputState>>,
    click_timer: TaskSlot,
    hide_timer: TaskSlot,
    visible_tx: watch::Sender<bool>,
}

impl InputCoordinator {
    pub fn new(transport: Transport, host: Arc<dyn FullscreenHost>, timings: InputTimings) -> Self {
        let (visible_tx, _) = watch::channel(true);
        Self {
            transport,
            host,
            timings,
            state: Arc::new(Mutex::new(InputState::default())),
            click_timer: TaskSlot::new(),
            hide_timer: TaskSlot::new(),
            visible_tx,
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        lock(&self.state).fullscreen
    }

    pub fn controls_visible(&self) -> bool {
        *self.visible_tx.borrow()
    }

    pub fn subscribe_visibility(&self) -> watch::Receiver<bool> {
        self.visible_tx.subscribe()
    }

    /// Count a click; the decision is made when the window closes
    pub fn handle_click(&self, target: ClickTarget) {
        if target == ClickTarget::Controls {
            return;
        }

        let clicks = {
            let mut state = lock(&self.state);
            state.clicks += 1;
            state.clicks
        };
        debug!(clicks, "Click");

        let state = Arc::clone(&self.state);
        let transport = self.transport.clone();
        let host = Arc::clone(&self.host);
        let window = self.timings.double_click_window;

        self.click_timer.spawn(async move {
            tokio::time::sleep(window).await;
            let (clicks, fullscreen) = {
                let mut state = lock(&state);
                let clicks = std::mem::take(&mut state.clicks);
                (clicks, state.fullscreen)
            };
            match clicks {
                1 => transport.toggle_play_pause().await,
                2 => toggle_fullscreen(host.as_ref(), fullscreen),
                _ => debug!(clicks, "Ignoring click burst"),
            }
        });
    }

    /// Dispatch a key press. Returns the action taken, if any.
    pub async fn handle_key(&self, key: Key, focus: Focus) -> Option<InputAction> {
        if focus != Focus::Page {
            return None;
        }

        let action = shortcut(key, &self.timings);
        match action {
            InputAction::TogglePlay => {
                {
                    let mut state = lock(&self.state);
                    let now = Instant::now();
                    if let Some(last) = state.last_key_toggle {
                        if now.duration_since(last) < self.timings.key_debounce {
                            debug!("Debounced keyboard toggle");
                            return None;
                        }
                    }
                    state.last_key_toggle = Some(now);
                }
                self.transport.toggle_play_pause().await;
            }
            InputAction::ToggleMute => self.transport.toggle_mute(),
            InputAction::ToggleFullscreen => self.toggle_fullscreen(),
            InputAction::Seek(delta) => self.transport.seek_relative(delta),
            InputAction::Volume(delta) => self.transport.adjust_volume(delta),
        }
        Some(action)
    }

    pub fn toggle_fullscreen(&self) {
        toggle_fullscreen(self.host.as_ref(), self.is_fullscreen());
    }

    /// The platform entered or left fullscreen
    pub fn handle_fullscreen_change(&self, fullscreen: bool) {
        lock(&self.state).fullscreen = fullscreen;
        debug!(fullscreen, "Fullscreen changed");
        if fullscreen {
            self.handle_pointer_move();
        } else {
            self.hide_timer.cancel();
            self.visible_tx.send_replace(true);
        }
    }

    /// Show the controls; in fullscreen, restart the inactivity timer
    pub fn handle_pointer_move(&self) {
        self.visible_tx.send_replace(true);
        if !self.is_fullscreen() {
            return;
        }

        let state = Arc::clone(&self.state);
        let visible = self.visible_tx.clone();
        let hide_after = self.timings.controls_hide_after;
        self.hide_timer.spawn(async move {
            tokio::time::sleep(hide_after).await;
            if lock(&state).fullscreen {
                visible.send_replace(false);
            }
        });
    }

    /// Pointer left the video area; hides at once in fullscreen
    pub fn handle_pointer_leave(&self) {
        if self.is_fullscreen() {
            self.hide_timer.cancel();
            self.visible_tx.send_replace(false);
        }
    }

    /// Drop pending clicks and timers
    pub fn cancel(&self) {
        self.click_timer.cancel();
        self.hide_timer.cancel();
        lock(&self.state).clicks = 0;
    }
}
