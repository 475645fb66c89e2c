//! Shared progress indicator.
//!
//! [`ProgressTracker`] is owned by the job controller and shared with the
//! push-channel handler. It publishes [`ProgressState`] through a
//! [`tokio::sync::watch`] channel so a UI can render the latest value,
//! and it owns the "task started" debounce flag that keeps late
//! lifecycle events from one job from resetting the next job's bar.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::watch;

use atelier_core::progress::{ProgressState, LABEL_COMPLETE, LABEL_STARTING};

/// Progress indicator shared between the controller and the push channel.
#[derive(Debug)]
pub struct ProgressTracker {
    state: watch::Sender<ProgressState>,
    task_started: AtomicBool,
    /// Bumped at every submission start; tags delayed hides.
    epoch: AtomicU64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProgressState::hidden());
        Self {
            state,
            task_started: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    /// Receive every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn snapshot(&self) -> ProgressState {
        self.state.borrow().clone()
    }

    pub fn is_task_started(&self) -> bool {
        self.task_started.load(Ordering::SeqCst)
    }

    /// Start of a submission: clear the started flag, show a zeroed bar.
    ///
    /// Returns the new epoch.
    pub fn begin(&self) -> u64 {
        self.task_started.store(false, Ordering::SeqCst);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(ProgressState::preparing());
        epoch
    }

    /// Record a progress report. The fraction is clamped into `[0, 1]`.
    pub fn report(&self, fraction: f64, description: &str) {
        self.state.send_modify(|s| s.report(fraction, description));
    }

    /// The backend began executing a node.
    ///
    /// The first such event after [`begin`](Self::begin) force-resets the
    /// bar to zero; repeats are ignored until [`execution_finished`]
    /// clears the flag. Returns whether the reset happened.
    ///
    /// [`execution_finished`]: Self::execution_finished
    pub fn execution_started(&self) -> bool {
        if self.task_started.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.report(0.0, LABEL_STARTING);
        true
    }

    /// The backend finished executing.
    pub fn execution_finished(&self) {
        self.task_started.store(false, Ordering::SeqCst);
    }

    /// Pin the bar at 100% with the completion label.
    ///
    /// Returns the epoch to hand to [`settle`](Self::settle) later.
    pub fn complete(&self) -> u64 {
        self.report(1.0, LABEL_COMPLETE);
        self.epoch.load(Ordering::SeqCst)
    }

    /// Hide and zero the bar, unless a newer submission has begun since
    /// `epoch` was issued.
    pub fn settle(&self, epoch: u64) -> bool {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.state.send_replace(ProgressState::hidden());
        true
    }

    /// Hide the bar immediately (on failure).
    pub fn hide(&self) {
        self.state.send_modify(|s| s.visible = false);
    }
}
