//! Quality-Level State Machine
//!
//! Tracks three separate facts:
//!
//! - the user's [`QualitySelection`] (`Auto` or `Manual(i)`),
//! - a manual switch still being committed (`Switching(i)`),
//! - the level the engine reports as actually playing.
//!
//! Selection and actual level are allowed to disagree. In auto mode the
//! engine moves between levels on its own; after a manual commit the engine
//! catches up a little later with `LevelSwitched`.
//!
//! A manual switch preloads the target with a next-level hint, waits a short
//! commit delay, then pins the level. Every switch, reset and teardown bumps
//! an epoch counter; the commit and the resume poll both compare their
//! captured epoch before acting, so a superseded switch never lands.

use crate::config::SwitchTuning;
use crate::engine::EngineAdapter;
use crate::media::buffered_ahead;
use crate::task::TaskSlot;
use crate::transport::Transport;
use crate::types::{
    closest_by_height, QualityChange, QualityLevel, QualityPreference, QualitySelection,
    QualityState,
};
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument};

/// What a quality request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Already selected or already being switched to; the engine was not touched
    Redundant,
    /// The engine already plays the level; only the selection changed
    Relabeled,
    /// The engine was commanded and the selection updated
    Committed,
    /// A newer request or a teardown took over before the commit
    Superseded,
    /// No engine accepts commands, or no level matched
    Ignored,
}

#[derive(Debug)]
struct QualityInner {
    levels: Vec<QualityLevel>,
    selection: QualitySelection,
    /// Target of a manual switch not yet committed
    pending: Option<usize>,
    /// Level the engine last reported as switched to
    actual_level: Option<usize>,
    /// Engine announced a switch that has not completed
    switching: bool,
}

impl Default for QualityInner {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            selection: QualitySelection::Auto,
            pending: None,
            actual_level: None,
            switching: false,
        }
    }
}

impl QualityInner {
    fn state(&self) -> QualityState {
        match (self.pending, self.selection) {
            (Some(target), _) => QualityState::Switching(target),
            (None, QualitySelection::Auto) => QualityState::Auto,
            (None, QualitySelection::Manual(index)) => QualityState::Manual(index),
        }
    }

    fn has_level(&self, index: usize) -> bool {
        self.levels.iter().any(|l| l.index == index)
    }
}

/// Reconciles user quality intent with engine level events
pub struct QualityController {
    adapter: Arc<EngineAdapter>,
    transport: Transport,
    tuning: SwitchTuning,
    inner: RwLock<QualityInner>,
    epoch: Arc<AtomicU64>,
    resume: TaskSlot,
    state_tx: watch::Sender<QualityState>,
}

impl QualityController {
    pub fn new(adapter: Arc<EngineAdapter>, transport: Transport, tuning: SwitchTuning) -> Self {
        let (state_tx, _) = watch::channel(QualityState::Auto);
        Self {
            adapter,
            transport,
            tuning,
            inner: RwLock::new(QualityInner::default()),
            epoch: Arc::new(AtomicU64::new(0)),
            resume: TaskSlot::new(),
            state_tx,
        }
    }

    /// Subscribe to state changes, including the transient `Switching` state
    pub fn subscribe_state(&self) -> watch::Receiver<QualityState> {
        self.state_tx.subscribe()
    }

    fn publish(&self, inner: &QualityInner) {
        self.state_tx.send_replace(inner.state());
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Replace the level set after a manifest parse. Selection returns to auto.
    pub async fn set_levels(&self, levels: Vec<QualityLevel>) {
        let mut inner = self.inner.write().await;
        self.next_epoch();
        self.resume.cancel();
        *inner = QualityInner {
            levels,
            ..QualityInner::default()
        };
        self.publish(&inner);
    }

    /// Drop levels, selection and any in-flight switch
    pub async fn clear(&self) {
        self.set_levels(Vec::new()).await;
    }

    pub async fn levels(&self) -> Vec<QualityLevel> {
        self.inner.read().await.levels.clone()
    }

    pub async fn selection(&self) -> QualitySelection {
        self.inner.read().await.selection
    }

    pub async fn state(&self) -> QualityState {
        self.inner.read().await.state()
    }

    pub async fn actual_level(&self) -> Option<usize> {
        self.inner.read().await.actual_level
    }

    /// A manual switch is being committed or the engine announced a switch
    pub async fn is_switching(&self) -> bool {
        let inner = self.inner.read().await;
        inner.pending.is_some() || inner.switching
    }

    /// A resume poll is waiting for buffer
    pub fn is_resume_pending(&self) -> bool {
        self.resume.is_pending()
    }

    /// Resolve a preference against the current level set
    pub async fn resolve(&self, preference: QualityPreference) -> Option<usize> {
        let inner = self.inner.read().await;
        match preference {
            QualityPreference::Auto => None,
            QualityPreference::LevelIndex(index) => inner.has_level(index).then_some(index),
            QualityPreference::Height(height) => {
                closest_by_height(&inner.levels, height).map(|l| l.index)
            }
        }
    }

    /// Pin the initial level right after the manifest is parsed. Playback has
    /// not started, so the level is committed without preload or resume.
    pub async fn apply_initial(&self, preference: QualityPreference) -> Option<usize> {
        let index = self.resolve(preference).await?;
        if !self.adapter.set_current_level(index).await {
            return None;
        }
        let mut inner = self.inner.write().await;
        inner.selection = QualitySelection::Manual(index);
        self.publish(&inner);
        info!(level = index, "Applied initial quality");
        Some(index)
    }

    /// Handle a host or menu quality request
    pub async fn request(&self, preference: QualityPreference) -> Result<SwitchOutcome> {
        match preference {
            QualityPreference::Auto => Ok(self.request_auto().await),
            QualityPreference::LevelIndex(index) => self.request_manual(index).await,
            QualityPreference::Height(height) => match self.resolve(preference).await {
                Some(index) => self.request_manual(index).await,
                None => {
                    debug!(height, "No level with a height to match");
                    Ok(SwitchOutcome::Ignored)
                }
            },
        }
    }

    /// Return level selection to the engine
    pub async fn request_auto(&self) -> SwitchOutcome {
        let mut inner = self.inner.write().await;
        if inner.selection == QualitySelection::Auto && inner.pending.is_none() {
            return SwitchOutcome::Redundant;
        }

        self.next_epoch();
        self.resume.cancel();
        if !self.adapter.set_auto_level().await {
            return SwitchOutcome::Ignored;
        }

        inner.pending = None;
        inner.selection = QualitySelection::Auto;
        self.publish(&inner);
        info!("Quality set to auto");
        SwitchOutcome::Committed
    }

    /// Pin `index`, keeping playback going across the switch
    #[instrument(skip(self))]
    pub async fn request_manual(&self, index: usize) -> Result<SwitchOutcome> {
        let epoch = {
            let mut inner = self.inner.write().await;
            if !inner.has_level(index) {
                return Err(Error::LevelOutOfRange {
                    index,
                    available: inner.levels.len(),
                });
            }

            let already_selected = match inner.pending {
                Some(target) => target == index,
                None => inner.selection == QualitySelection::Manual(index),
            };
            if already_selected {
                debug!("Redundant quality request");
                return Ok(SwitchOutcome::Redundant);
            }

            if inner.pending.is_none()
                && inner.selection == QualitySelection::Auto
                && inner.actual_level == Some(index)
            {
                inner.selection = QualitySelection::Manual(index);
                self.publish(&inner);
                debug!("Engine already plays the level, relabeling");
                return Ok(SwitchOutcome::Relabeled);
            }

            inner.pending = Some(index);
            self.publish(&inner);
            self.next_epoch()
        };
        self.resume.cancel();

        let media = self.transport.media();
        let was_playing = !media.is_paused();
        let ahead = buffered_ahead(media.as_ref());

        if !self.adapter.set_next_level(index).await {
            self.abandon(epoch).await;
            return Ok(SwitchOutcome::Ignored);
        }

        tokio::time::sleep(self.tuning.commit_delay).await;

        {
            let mut inner = self.inner.write().await;
            if !self.is_current(epoch) {
                debug!(epoch, "Switch superseded before commit");
                return Ok(SwitchOutcome::Superseded);
            }
            if !self.adapter.set_current_level(index).await {
                inner.pending = None;
                self.publish(&inner);
                return Ok(SwitchOutcome::Ignored);
            }
            inner.pending = None;
            inner.selection = QualitySelection::Manual(index);
            self.publish(&inner);
        }

        info!(level = index, was_playing, buffered_ahead = ahead, "Quality switch committed");

        if was_playing {
            if ahead > self.tuning.continuity_threshold_sec {
                self.transport.play_or_log().await;
            } else {
                self.spawn_resume(epoch);
            }
        }

        Ok(SwitchOutcome::Committed)
    }

    async fn abandon(&self, epoch: u64) {
        let mut inner = self.inner.write().await;
        if self.is_current(epoch) {
            inner.pending = None;
            self.publish(&inner);
        }
    }

    /// Resume once enough is buffered. Gives up when the epoch moves on.
    fn spawn_resume(&self, epoch: u64) {
        let current = Arc::clone(&self.epoch);
        let transport = self.transport.clone();
        let threshold = self.tuning.resume_threshold_sec;
        let interval = self.tuning.poll_interval;

        self.resume.spawn(async move {
            loop {
                if current.load(Ordering::SeqCst) != epoch {
                    debug!(epoch, "Resume poll abandoned");
                    return;
                }
                let ahead = buffered_ahead(transport.media().as_ref());
                if ahead > threshold {
                    debug!(buffered_ahead = ahead, "Buffer refilled, resuming");
                    transport.play_or_log().await;
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    /// Engine started moving to another level
    pub async fn on_level_switching(&self, target: usize) {
        let mut inner = self.inner.write().await;
        inner.switching = true;
        debug!(target, state = %inner.state(), "Level switching");
    }

    /// Engine finished a switch. The selection only falls back to auto when
    /// the engine itself is in auto mode.
    pub async fn on_level_switched(&self, actual: usize) -> Option<QualityChange> {
        let auto = self.adapter.auto_level_enabled().await;
        let mut inner = self.inner.write().await;
        inner.switching = false;
        inner.actual_level = Some(actual);
        if auto && inner.pending.is_none() {
            inner.selection = QualitySelection::Auto;
        }
        self.publish(&inner);
        debug!(actual, auto, selection = %inner.selection, "Level switched");

        inner
            .levels
            .iter()
            .find(|l| l.index == actual)
            .map(|level| QualityChange {
                level_index: actual,
                height: level.height_px,
                bitrate_kbps: level.bitrate_kbps,
            })
    }

    /// Abandon any in-flight switch or resume poll
    pub async fn cancel(&self) {
        let mut inner = self.inner.write().await;
        self.next_epoch();
        self.resume.cancel();
        if inner.pending.take().is_some() {
            self.publish(&inner);
        }
    }
}
