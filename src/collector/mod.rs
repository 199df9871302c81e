//! Rate-limited, retrying fan-out collection
//!
//! # Overview
//!
//! 1. **Listing**: [`Collector::crawl`] drives a paginated listing through
//!    the [`crate::pagination::Paginator`]
//! 2. **Fan-out**: every listed item is processed by its own task, bounded by
//!    `max_concurrency` ([`pool`])
//! 3. **Retries**: sub-calls go through the [`retry::RetryExecutor`], which
//!    waits on the shared [`rate_limit::RateLimiter`] before each attempt
//! 4. **Throttling**: throttled calls halve the limiter rate and raise the
//!    [`pause::PauseSignal`]; successful calls restore the rate step by step
//! 5. **Emission**: resources reach a [`crate::sink::ResourceSink`] on the
//!    collecting task only
//!
//! # Components
//!
//! - [`classify`] - Error codes mapped to retry decisions
//! - [`rate_limit`] - Token bucket with adjustable rate
//! - [`retry`] - Backoff, jitter and throttle reaction
//! - [`pause`] - Throttle cool-down signal
//! - [`pool`] - Worker pool and collection runs

pub mod classify;
pub mod pause;
pub mod pool;
pub mod rate_limit;
pub mod retry;

pub use classify::{ApiError, ErrorClass, ErrorClassifier, ServiceError, THROTTLING_CODES};
pub use pause::PauseSignal;
pub use pool::{
    CollectReport, CollectSummary, Collector, ItemFailure, WorkItem, WorkerContext,
};
pub use rate_limit::RateLimiter;
pub use retry::{RetryExecutor, RetryPolicy};
