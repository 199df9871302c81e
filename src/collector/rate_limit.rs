//! Token-bucket rate limiter with an adjustable refill rate
//!
//! One limiter is shared by every call a collector makes against a single
//! external API. The refill rate can be lowered when the provider throttles
//! and raised again as calls succeed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::CollectError;
use crate::metrics;

/// Lowest refill rate the limiter accepts. Never zero, so waits always end.
pub const MIN_RATE: f64 = 1.0;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(burst);
        self.last_refill = now;
    }
}

/// Token-bucket limiter
#[derive(Debug)]
pub struct RateLimiter {
    // f64 bits, readable without taking the bucket lock
    rate: AtomicU64,
    base_rate: f64,
    burst: u32,
    bucket: Mutex<Bucket>,
}

fn clamp_rate(rate: f64) -> f64 {
    // NaN compares false and falls through to the floor
    if rate >= MIN_RATE {
        rate
    } else {
        MIN_RATE
    }
}

impl RateLimiter {
    /// Create a limiter refilling `rate` tokens per second with capacity
    /// `burst`. The bucket starts full.
    ///
    /// # Arguments
    /// * `rate` - Tokens per second, clamped to at least [`MIN_RATE`]
    /// * `burst` - Bucket capacity, at least 1
    pub fn new(rate: f64, burst: u32) -> Self {
        let rate = clamp_rate(rate);
        let burst = burst.max(1);
        metrics::record_rate_limit(rate);
        Self {
            rate: AtomicU64::new(rate.to_bits()),
            base_rate: rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait for a token, consuming it on success.
    ///
    /// # Errors
    /// Returns [`CollectError::Cancelled`] if `cancel` fires first.
    pub async fn wait(&self, cancel: &CancelToken) -> Result<(), CollectError> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(CollectError::Cancelled);
            }

            let delay = match self.try_acquire(Instant::now()) {
                None => break,
                Some(delay) => delay,
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(CollectError::Cancelled),
            }
        }

        metrics::record_limiter_wait(started.elapsed());
        Ok(())
    }

    /// Take a token if one is available; otherwise return how long until
    /// the next one accrues at the current rate.
    fn try_acquire(&self, now: Instant) -> Option<Duration> {
        let mut bucket = self.lock_bucket();
        let rate = self.limit();
        bucket.refill(now, rate, f64::from(self.burst));

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            Some(Duration::from_secs_f64((1.0 - bucket.tokens) / rate))
        }
    }

    /// Change the refill rate. Tokens accrued so far are kept; only
    /// subsequent accrual uses the new rate.
    pub fn set_limit(&self, rate: f64) {
        let mut bucket = self.lock_bucket();
        self.set_limit_locked(&mut bucket, rate);
    }

    fn set_limit_locked(&self, bucket: &mut Bucket, rate: f64) -> f64 {
        let rate = clamp_rate(rate);
        bucket.refill(Instant::now(), self.limit(), f64::from(self.burst));
        self.rate.store(rate.to_bits(), Ordering::SeqCst);
        metrics::record_rate_limit(rate);
        debug!(rate = rate, "Rate limit adjusted");
        rate
    }

    /// Divide the current rate by `divisor` (floor [`MIN_RATE`]) as a single
    /// step, returning the new rate.
    pub fn scale_down(&self, divisor: f64) -> f64 {
        let mut bucket = self.lock_bucket();
        let next = self.limit() / divisor;
        self.set_limit_locked(&mut bucket, next)
    }

    /// Raise the current rate by `step`, never above the rate the limiter
    /// was created with. Returns the new rate.
    pub fn raise_toward_base(&self, step: f64) -> f64 {
        let mut bucket = self.lock_bucket();
        let current = self.limit();
        if current >= self.base_rate {
            return current;
        }
        let next = (current + step).min(self.base_rate);
        self.set_limit_locked(&mut bucket, next)
    }

    /// Current refill rate (tokens per second).
    pub fn limit(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::SeqCst))
    }

    /// Rate the limiter was created with.
    pub fn base_limit(&self) -> f64 {
        self.base_rate
    }

    /// Bucket capacity.
    pub fn burst(&self) -> u32 {
        self.burst
    }

    fn lock_bucket(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
