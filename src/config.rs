//! Collector configuration constants and file-backed settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::collector::classify::{ErrorClassifier, THROTTLING_CODES};
use crate::collector::retry::RetryPolicy;
use crate::error::CollectError;

/// Default refill rate of the shared limiter (tokens per second).
/// Conservative enough for the strictest management APIs (Organizations
/// allows a handful of calls per second per account).
pub const DEFAULT_RATE_LIMIT: f64 = 10.0;

/// Default bucket capacity. Equal to the rate so a cold start may issue one
/// second's worth of calls at once.
pub const DEFAULT_BURST: u32 = 10;

/// Default number of concurrently processed work items.
/// Tied to the rate limit: more workers than tokens per second only queue
/// on the limiter.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Maximum number of retries per call.
/// 5 retries with exponential backoff covers throttling episodes of about a
/// minute before an item is reported as failed.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds. Also the upper bound of the jitter.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Factor the limiter rate is divided by when a call is throttled.
pub const THROTTLE_RATE_DIVISOR: f64 = 2.0;

/// Tokens/sec restored per successful call after a throttle reduction.
pub const RECOVERY_STEP: f64 = 1.0;

/// Cool-down a worker sleeps after observing a pause signal.
pub const PAUSE_COOLDOWN: Duration = Duration::from_secs(5);

/// Maximum number of pages a single listing may return before the
/// paginator gives up on a cursor that never terminates.
pub const MAX_PAGES: usize = 10_000;

/// Upper bound accepted for `max_concurrency`.
pub const MAX_CONCURRENCY_LIMIT: usize = 64;

/// Calculate the deterministic part of the exponential backoff:
/// `base * 2^attempt`, capped at `max`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

/// Serializable collector settings.
///
/// Every field has a default, so a config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Limiter refill rate (tokens per second)
    pub rate_limit: f64,
    /// Limiter bucket capacity
    pub burst: u32,
    /// Concurrently processed work items
    pub max_concurrency: usize,
    /// Retries per call after the first attempt
    pub max_retries: u32,
    /// Backoff base delay and jitter bound (milliseconds)
    pub base_delay_ms: u64,
    /// Backoff cap (milliseconds)
    pub max_delay_ms: u64,
    /// Rate divisor applied on throttling
    pub throttle_rate_divisor: f64,
    /// Additive rate recovery per successful call (0 disables)
    pub recovery_step: f64,
    /// Pause cool-down (milliseconds)
    pub pause_cooldown_ms: u64,
    /// Page cap per listing; `None` disables the cap
    pub max_pages: Option<usize>,
    /// Error codes treated as throttling
    pub throttling_codes: Vec<String>,
    /// Error codes that fail immediately without retry
    pub fatal_codes: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            burst: DEFAULT_BURST,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: MAX_RETRIES,
            base_delay_ms: INITIAL_BACKOFF_MS,
            max_delay_ms: MAX_BACKOFF_MS,
            throttle_rate_divisor: THROTTLE_RATE_DIVISOR,
            recovery_step: RECOVERY_STEP,
            pause_cooldown_ms: PAUSE_COOLDOWN.as_millis() as u64,
            max_pages: Some(MAX_PAGES),
            throttling_codes: THROTTLING_CODES.iter().map(|c| c.to_string()).collect(),
            fatal_codes: Vec::new(),
        }
    }
}

impl CollectorConfig {
    /// Load settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CollectError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CollectError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            CollectError::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), CollectError> {
        if !(self.rate_limit >= 1.0) || !self.rate_limit.is_finite() {
            return Err(CollectError::InvalidConfig(format!(
                "rate_limit must be a finite value >= 1, got {}",
                self.rate_limit
            )));
        }
        if self.burst == 0 {
            return Err(CollectError::InvalidConfig(
                "burst must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(CollectError::InvalidConfig(format!(
                "max_concurrency must be between 1 and {MAX_CONCURRENCY_LIMIT}, got {}",
                self.max_concurrency
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(CollectError::InvalidConfig(format!(
                "max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        if !(self.throttle_rate_divisor >= 1.0) {
            return Err(CollectError::InvalidConfig(format!(
                "throttle_rate_divisor must be >= 1, got {}",
                self.throttle_rate_divisor
            )));
        }
        if !(self.recovery_step >= 0.0) {
            return Err(CollectError::InvalidConfig(format!(
                "recovery_step must be >= 0, got {}",
                self.recovery_step
            )));
        }
        if self.max_pages == Some(0) {
            return Err(CollectError::InvalidConfig(
                "max_pages must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            throttle_rate_divisor: self.throttle_rate_divisor,
            recovery_step: self.recovery_step,
            classifier: ErrorClassifier::new(
                self.throttling_codes.iter().cloned(),
                self.fatal_codes.iter().cloned(),
            ),
        }
    }

    /// Pause cool-down as a duration.
    pub fn pause_cooldown(&self) -> Duration {
        Duration::from_millis(self.pause_cooldown_ms)
    }
}
