//! Throttle pause signal shared by the workers of one collector

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::PAUSE_COOLDOWN;
use crate::error::CollectError;

/// Single-slot "slow down" flag.
///
/// Raised without blocking whenever throttling is seen; drained by whichever
/// worker checks it next, which then sleeps the cool-down. Repeated signals
/// before a drain collapse into one.
#[derive(Debug)]
pub struct PauseSignal {
    pending: AtomicBool,
    cooldown: Duration,
}

impl Default for PauseSignal {
    fn default() -> Self {
        Self::new(PAUSE_COOLDOWN)
    }
}

impl PauseSignal {
    /// Create a signal whose observer sleeps `cooldown`.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            pending: AtomicBool::new(false),
            cooldown,
        }
    }

    /// Raise the signal. Returns `false` if it was already pending.
    pub fn signal(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Drain the signal. Only one caller observes each raise.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a raise is waiting to be drained.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Cool-down applied by the observer.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Drain the signal and, if it was raised, sleep the cool-down.
    ///
    /// Returns whether this caller paused.
    pub async fn observe(&self, cancel: &CancelToken) -> Result<bool, CollectError> {
        if !self.take() {
            return Ok(false);
        }
        info!(
            cooldown_ms = self.cooldown.as_millis() as u64,
            "Throttling detected - pausing worker"
        );
        cancel.sleep(self.cooldown).await?;
        Ok(true)
    }
}
