//! Owned background timers
//!
//! Every deferred action the controller schedules (resume poll, click
//! window, inactivity hide, stats interval) lives in a [`TaskSlot`]. Setting a
//! slot aborts whatever it held, and dropping the owner aborts the rest, so
//! nothing outlives `destroy()`.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Holds at most one spawned task
#[derive(Debug, Default)]
pub struct TaskSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `future`, aborting the task previously held
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        if let Some(previous) = self.guard().replace(handle) {
            previous.abort();
        }
    }

    /// Abort the held task, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.guard().take() {
            handle.abort();
        }
    }

    /// A task is held and has not finished
    pub fn is_pending(&self) -> bool {
        self.guard().as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
