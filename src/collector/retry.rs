//! Retry executor: rate limiting, exponential backoff with jitter and
//! throttle-aware rate reduction around a single external call.

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::classify::{ApiError, ErrorClass, ErrorClassifier};
use super::pause::PauseSignal;
use super::rate_limit::RateLimiter;
use crate::cancel::CancelToken;
use crate::config::{
    calculate_backoff, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES, RECOVERY_STEP,
    THROTTLE_RATE_DIVISOR,
};
use crate::error::CollectError;
use crate::metrics;

/// Retry settings. Immutable once handed to an executor.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff base; also the upper bound of the random jitter
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
    /// Divisor applied to the limiter rate on throttling
    pub throttle_rate_divisor: f64,
    /// Rate restored per successful call (0 disables recovery)
    pub recovery_step: f64,
    /// Maps error codes to retry decisions
    pub classifier: ErrorClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            throttle_rate_divisor: THROTTLE_RATE_DIVISOR,
            recovery_step: RECOVERY_STEP,
            classifier: ErrorClassifier::default(),
        }
    }
}

impl RetryPolicy {
    /// Set the retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set backoff base and cap.
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Set the additive recovery step.
    pub fn with_recovery_step(mut self, step: f64) -> Self {
        self.recovery_step = step;
        self
    }

    /// Replace the error classifier.
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Delay before retrying after failed attempt `attempt` (0-based):
    /// `2^attempt * base + jitter(0..=base)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=base_ms));
        calculate_backoff(attempt, self.base_delay, self.max_delay)
            .saturating_add(jitter)
            .min(self.max_delay)
    }
}

/// Runs external calls under the collector's limiter and retry policy.
///
/// Cheap to clone; every clone shares the same limiter and pause signal.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    limiter: Arc<RateLimiter>,
    pause: Arc<PauseSignal>,
    policy: Arc<RetryPolicy>,
    cancel: CancelToken,
}

impl RetryExecutor {
    /// Create an executor over shared collector state.
    pub fn new(
        limiter: Arc<RateLimiter>,
        pause: Arc<PauseSignal>,
        policy: Arc<RetryPolicy>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            limiter,
            pause,
            policy,
            cancel,
        }
    }

    /// Same executor, observing a different cancellation token.
    pub fn with_cancel(&self, cancel: CancelToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    /// Shared rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Cancellation token observed by waits and backoffs.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Execute `op` with rate limiting and retries.
    ///
    /// `op` is invoked at most `max_retries + 1` times, each invocation
    /// preceded by a limiter wait. Throttling errors raise the pause signal
    /// and divide the limiter rate before backing off.
    ///
    /// # Errors
    /// - [`CollectError::Cancelled`] if cancelled while waiting or backing off
    /// - [`CollectError::Fatal`] for errors classified as non-retryable
    /// - [`CollectError::MaxRetriesReached`] carrying the last error once all
    ///   attempts failed
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> Result<T, CollectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ApiError,
    {
        let attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            self.limiter.wait(&self.cancel).await?;
            metrics::record_api_call();

            let err = match op().await {
                Ok(value) => {
                    self.recover();
                    return Ok(value);
                }
                Err(err) => err,
            };

            attempt += 1;
            let class = self.policy.classifier.classify_error(&err);
            match class {
                ErrorClass::Fatal => {
                    warn!(attempt = attempt, error = %err, "Non-retryable error");
                    return Err(CollectError::Fatal(Box::new(err)));
                }
                ErrorClass::Throttled => self.on_throttled(),
                ErrorClass::Transient => {}
            }

            if attempt >= attempts {
                warn!(
                    attempts = attempts,
                    error = %err,
                    "Max retries reached"
                );
                return Err(CollectError::MaxRetriesReached {
                    attempts,
                    source: Box::new(err),
                });
            }

            let backoff = self.policy.backoff(attempt - 1);
            warn!(
                attempt = attempt,
                max_attempts = attempts,
                backoff_ms = backoff.as_millis() as u64,
                throttled = class == ErrorClass::Throttled,
                error = %err,
                "Call failed, retrying after backoff"
            );
            metrics::record_retry(attempt, backoff);
            self.cancel.sleep(backoff).await?;
        }
    }

    fn on_throttled(&self) {
        self.pause.signal();
        let rate = self.limiter.scale_down(self.policy.throttle_rate_divisor);
        metrics::record_throttle();
        warn!(rate = rate, "Throttled - reducing rate limit");
    }

    fn recover(&self) {
        if self.policy.recovery_step <= 0.0 {
            return;
        }
        let before = self.limiter.limit();
        if before < self.limiter.base_limit() {
            let rate = self.limiter.raise_toward_base(self.policy.recovery_step);
            debug!(rate = rate, "Rate limit recovering");
        }
    }
}
