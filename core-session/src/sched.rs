//! # Cancellable Scheduled Tasks
//!
//! A [`TaskSlot`] holds at most one scheduled task per concern (a timeout,
//! a retry, a sampling loop). Arming a slot cancels whatever occupied it
//! before; dropping the owning component cancels everything. This makes
//! "no timer survives a teardown" a property of the types instead of a
//! convention.
//!
//! Cancellation is cooperative: a callback that has already started runs to
//! completion, matching the run-to-completion execution model of the whole
//! control layer.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

struct ActiveTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// One cancellable scheduled task.
///
/// # Example
///
/// ```ignore
/// let slot = TaskSlot::new();
/// slot.spawn_after(Duration::from_secs(5), || println!("timeout"));
/// slot.cancel(); // never fires
/// ```
pub struct TaskSlot {
    inner: Mutex<Option<ActiveTask>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Arms the slot with a one-shot callback fired after `delay`.
    ///
    /// Replaces (and cancels) any task currently occupying the slot.
    pub fn spawn_after<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = time::sleep(delay) => f(),
            }
        });
        self.replace(ActiveTask { token, handle });
    }

    /// Arms the slot with a callback fired every `period`, first firing one
    /// period from now.
    ///
    /// Replaces (and cancels) any task currently occupying the slot. Missed
    /// ticks are skipped, not bunched.
    pub fn spawn_every<F>(&self, period: Duration, mut f: F)
    where
        F: FnMut() + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => f(),
                }
            }
        });
        self.replace(ActiveTask { token, handle });
    }

    /// Cancels the scheduled task, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(task) = self.inner.lock().take() {
            task.token.cancel();
        }
    }

    /// Returns `true` while a scheduled task is pending or running.
    pub fn is_armed(&self) -> bool {
        self.inner
            .lock()
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    fn replace(&self, task: ActiveTask) {
        if let Some(previous) = self.inner.lock().replace(task) {
            previous.token.cancel();
        }
    }
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
