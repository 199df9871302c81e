//! Cooperative cancellation shared across collector tasks.
//!
//! A [`CancelToken`] is cloned into every worker, limiter wait, backoff sleep
//! and pause cool-down so a cancelled run unwinds at its next suspension
//! point. Child tokens let a single collection run stop its own workers
//! without cancelling the caller's token; a child detaches from its parent
//! once its last clone is dropped.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::CollectError;

/// Cloneable cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that is cancelled whenever `self` is, but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }

    /// Request cancellation. Wakes all waiters.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Wait until cancellation is requested. Returns immediately if already set.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CollectError> {
        if self.is_cancelled() {
            return Err(CollectError::Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(CollectError::Cancelled),
        }
    }

    /// Cancel this token once `timeout` elapses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel_after(&self, timeout: Duration) {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Deadline reached - cancelling");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        });
    }
}
