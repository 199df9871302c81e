//! # Inventory Crawler Library
//!
//! Rate-limited, retrying, paginated fan-out collection for cloud resource
//! inventories.
//!
//! ## Features
//!
//! - **Token-Bucket Rate Limiting**: One limiter per collector, shared by
//!   every call, with a rate that shrinks on throttling and recovers on
//!   success
//! - **Retries**: Exponential backoff with jitter and centralized error
//!   classification
//! - **Bounded Fan-Out**: One task per listed item, with per-item failure
//!   isolation and panic containment
//! - **Capped Pagination**: Cursor-driven listings with a page safety cap
//! - **Buffered or Streaming Output**: Uniform [`Resource`] envelopes
//!
//! ## Quick Start
//!
//! ```no_run
//! use inventory_crawler::{
//!     BufferSink, CollectError, Collector, DescribeContext, Page, Resource, ServiceError,
//! };
//!
//! # async fn example() -> Result<(), CollectError> {
//! let collector = Collector::new(DescribeContext::new("us-east-1", "111122223333"))
//!     .with_rate_limit(5.0, 5)
//!     .with_max_concurrency(5);
//!
//! let mut sink = BufferSink::new();
//! let summary = collector
//!     .crawl(
//!         |_cursor| async { Ok::<_, ServiceError>(Page::last(vec!["bucket-a".to_string()])) },
//!         |ctx, name| async move {
//!             Ok::<_, CollectError>(
//!                 Resource::new(&ctx.describe().region)
//!                     .with_arn(ctx.describe().global_arn("s3", &name))
//!                     .with_name(name),
//!             )
//!         },
//!         &mut sink,
//!     )
//!     .await?;
//!
//! assert!(summary.is_complete());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`collector`] - Rate limiter, retry executor, pause signal and worker pool
//! - [`pagination`] - Cursor-driven page loop
//! - [`sink`] - Buffering and streaming resource sinks
//! - [`resource`] - Resource envelope and describe context
//! - [`accounts`] - Organization account crawler
//! - [`config`] - Defaults and file-backed settings
//! - [`cancel`] - Cooperative cancellation
//! - [`metrics`] / [`logging`] - Observability setup

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Organization account crawler
pub mod accounts;

/// Cooperative cancellation
pub mod cancel;

/// Command-line interface
pub mod cli;

/// Rate-limited, retrying fan-out collection
pub mod collector;

/// Configuration constants and settings
pub mod config;

/// Error types
pub mod error;

/// Tracing subscriber setup
pub mod logging;

/// Production observability metrics
pub mod metrics;

/// Cursor-driven pagination
pub mod pagination;

/// Resource envelope
pub mod resource;

/// Resource emission sinks
pub mod sink;

pub use cancel::CancelToken;
pub use collector::{
    ApiError, CollectReport, CollectSummary, Collector, ErrorClass, ErrorClassifier,
    ItemFailure, PauseSignal, RateLimiter, RetryExecutor, RetryPolicy, ServiceError, WorkItem,
    WorkerContext,
};
pub use config::CollectorConfig;
pub use error::{BoxError, CollectError, CollectResult};
pub use pagination::{Page, Paginator};
pub use resource::{DescribeContext, Resource};
pub use sink::{BufferSink, ResourceSink, StreamSink};
