//! Fan-out collector
//!
//! Runs one task per work item, at most `max_concurrency` at a time, and
//! funnels every result to the calling task over a channel. The calling task
//! is the only writer of the sink and the failure list.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::classify::ApiError;
use super::pause::PauseSignal;
use super::rate_limit::RateLimiter;
use super::retry::{RetryExecutor, RetryPolicy};
use crate::cancel::CancelToken;
use crate::config::{CollectorConfig, DEFAULT_BURST, DEFAULT_MAX_CONCURRENCY, DEFAULT_RATE_LIMIT};
use crate::error::CollectError;
use crate::metrics;
use crate::pagination::{Page, Paginator};
use crate::resource::{DescribeContext, Resource};
use crate::sink::{BufferSink, ResourceSink};

/// A top-level entity processed by one worker.
pub trait WorkItem: Send + 'static {
    /// Stable identity used to tag failures.
    fn key(&self) -> String;
}

impl WorkItem for String {
    fn key(&self) -> String {
        self.clone()
    }
}

impl WorkItem for &'static str {
    fn key(&self) -> String {
        (*self).to_string()
    }
}

impl WorkItem for u64 {
    fn key(&self) -> String {
        self.to_string()
    }
}

impl WorkItem for usize {
    fn key(&self) -> String {
        self.to_string()
    }
}

/// Everything a worker's enrichment step may use.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    executor: RetryExecutor,
    describe: Arc<DescribeContext>,
    paginator: Paginator,
    key: String,
}

impl WorkerContext {
    /// Retry executor bound to this run's cancellation scope.
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Region, account and partition being collected.
    pub fn describe(&self) -> &DescribeContext {
        &self.describe
    }

    /// Pagination driver for sub-listings.
    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    /// Cancellation token of this run.
    pub fn cancel_token(&self) -> &CancelToken {
        self.executor.cancel_token()
    }

    /// Key of the item being processed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Shorthand for `self.executor().execute(op)`.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, CollectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ApiError,
    {
        self.executor.execute(op).await
    }
}

/// Terminal failure of one work item.
#[derive(Debug)]
pub struct ItemFailure {
    /// Key of the failed item
    pub key: String,
    /// Why it failed
    pub error: CollectError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

/// Outcome of a buffered collection run.
#[derive(Debug)]
pub struct CollectReport {
    /// Resources in completion order
    pub resources: Vec<Resource>,
    /// Per-item failures
    pub failures: Vec<ItemFailure>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the last worker finished
    pub finished_at: DateTime<Utc>,
}

impl CollectReport {
    /// Whether every item produced a resource.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a collection run into a caller-supplied sink.
#[derive(Debug)]
pub struct CollectSummary {
    /// Resources accepted by the sink
    pub emitted: usize,
    /// Per-item failures
    pub failures: Vec<ItemFailure>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the last worker finished
    pub finished_at: DateTime<Utc>,
}

impl CollectSummary {
    /// Whether every item produced a resource.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Rate-limited, retrying fan-out collector.
///
/// Owns its rate limiter and pause signal; independent collectors never
/// share throttling state.
///
/// # Example
///
/// ```no_run
/// use inventory_crawler::{Collector, CollectError, DescribeContext, Resource};
///
/// # async fn example() {
/// let collector = Collector::new(DescribeContext::new("us-east-1", "111122223333"))
///     .with_max_concurrency(4);
///
/// let report = collector
///     .collect(vec!["a".to_string(), "b".to_string()], |ctx, item| async move {
///         Ok::<_, CollectError>(Resource::new(&ctx.describe().region).with_id(item))
///     })
///     .await;
/// assert!(report.is_complete());
/// # }
/// ```
#[derive(Debug)]
pub struct Collector {
    limiter: Arc<RateLimiter>,
    pause: Arc<PauseSignal>,
    policy: Arc<RetryPolicy>,
    max_concurrency: usize,
    paginator: Paginator,
    context: Arc<DescribeContext>,
    cancel: CancelToken,
}

impl Collector {
    /// Create a collector with default limits.
    pub fn new(context: DescribeContext) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(DEFAULT_RATE_LIMIT, DEFAULT_BURST)),
            pause: Arc::new(PauseSignal::default()),
            policy: Arc::new(RetryPolicy::default()),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            paginator: Paginator::default(),
            context: Arc::new(context),
            cancel: CancelToken::new(),
        }
    }

    /// Create a collector from validated settings.
    pub fn from_config(
        config: &CollectorConfig,
        context: DescribeContext,
    ) -> Result<Self, CollectError> {
        config.validate()?;
        Ok(Self::new(context)
            .with_rate_limit(config.rate_limit, config.burst)
            .with_max_concurrency(config.max_concurrency)
            .with_policy(config.retry_policy())
            .with_pause_cooldown(config.pause_cooldown())
            .with_paginator(Paginator::new(config.max_pages)))
    }

    /// Replace the rate limiter.
    pub fn with_rate_limit(mut self, rate: f64, burst: u32) -> Self {
        self.limiter = Arc::new(RateLimiter::new(rate, burst));
        self
    }

    /// Set the worker bound (at least 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Set the throttle pause cool-down.
    pub fn with_pause_cooldown(mut self, cooldown: Duration) -> Self {
        self.pause = Arc::new(PauseSignal::new(cooldown));
        self
    }

    /// Replace the pagination driver.
    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = paginator;
        self
    }

    /// Observe an external cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retry executor over this collector's limiter and policy.
    pub fn executor(&self) -> RetryExecutor {
        RetryExecutor::new(
            Arc::clone(&self.limiter),
            Arc::clone(&self.pause),
            Arc::clone(&self.policy),
            self.cancel.clone(),
        )
    }

    /// Pagination driver.
    pub fn paginator(&self) -> Paginator {
        self.paginator
    }

    /// Cancellation token observed by every run.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Shared rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Shared throttle pause signal.
    pub fn pause_signal(&self) -> &Arc<PauseSignal> {
        &self.pause
    }

    /// Describe context handed to workers.
    pub fn context(&self) -> &DescribeContext {
        &self.context
    }

    /// Worker bound.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Process every item and buffer the resulting resources.
    ///
    /// Failed items are reported alongside the resources; they never abort
    /// sibling items.
    pub async fn collect<I, T, F, Fut>(&self, items: I, process: F) -> CollectReport
    where
        I: IntoIterator<Item = T>,
        T: WorkItem,
        F: Fn(WorkerContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resource, CollectError>> + Send + 'static,
    {
        let mut sink = BufferSink::new();
        // BufferSink never rejects, so the run cannot halt
        let (summary, _) = self.drive(items, process, &mut sink).await;
        CollectReport {
            resources: sink.into_resources(),
            failures: summary.failures,
            started_at: summary.started_at,
            finished_at: summary.finished_at,
        }
    }

    /// Process every item, emitting resources into `sink` as they complete.
    ///
    /// # Errors
    /// Returns the sink's error if it rejects a resource. Nothing is emitted
    /// after that; in-flight workers are cancelled and joined first.
    pub async fn collect_into<I, T, F, Fut, S>(
        &self,
        items: I,
        process: F,
        sink: &mut S,
    ) -> Result<CollectSummary, CollectError>
    where
        I: IntoIterator<Item = T>,
        T: WorkItem,
        F: Fn(WorkerContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resource, CollectError>> + Send + 'static,
        S: ResourceSink + ?Sized,
    {
        match self.drive(items, process, sink).await {
            (_, Some(err)) => Err(err),
            (summary, None) => Ok(summary),
        }
    }

    /// List every item through the paginator, then fan out over them.
    ///
    /// Each page fetch runs under the retry executor.
    ///
    /// # Errors
    /// A listing failure is terminal and returned before any item is
    /// processed; otherwise as [`Collector::collect_into`].
    pub async fn crawl<T, E, L, LFut, F, Fut, S>(
        &self,
        list_page: L,
        process: F,
        sink: &mut S,
    ) -> Result<CollectSummary, CollectError>
    where
        T: WorkItem,
        E: ApiError,
        L: Fn(Option<String>) -> LFut,
        LFut: Future<Output = Result<Page<T>, E>>,
        F: Fn(WorkerContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resource, CollectError>> + Send + 'static,
        S: ResourceSink + ?Sized,
    {
        let executor = self.executor();
        let executor = &executor;
        let list_page = &list_page;

        let items = self
            .paginator
            .list_all(move |cursor| async move {
                executor.execute(|| list_page(cursor.clone())).await
            })
            .await?;

        info!(items = items.len(), "Listing complete, processing items");
        self.collect_into(items, process, sink).await
    }

    async fn drive<I, T, F, Fut, S>(
        &self,
        items: I,
        process: F,
        sink: &mut S,
    ) -> (CollectSummary, Option<CollectError>)
    where
        I: IntoIterator<Item = T>,
        T: WorkItem,
        F: Fn(WorkerContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resource, CollectError>> + Send + 'static,
        S: ResourceSink + ?Sized,
    {
        let span = info_span!(
            "collect",
            region = %self.context.region,
            account = %self.context.account_id,
            max_concurrency = self.max_concurrency
        );
        self.drive_inner(items, process, sink).instrument(span).await
    }

    async fn drive_inner<I, T, F, Fut, S>(
        &self,
        items: I,
        process: F,
        sink: &mut S,
    ) -> (CollectSummary, Option<CollectError>)
    where
        I: IntoIterator<Item = T>,
        T: WorkItem,
        F: Fn(WorkerContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resource, CollectError>> + Send + 'static,
        S: ResourceSink + ?Sized,
    {
        let started_at = Utc::now();

        // Cancelled on sink failure without touching the caller's token
        let scope = self.cancel.child();
        let executor = self.executor().with_cancel(scope.clone());
        let process = Arc::new(process);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, Result<Resource, CollectError>)>();
        let mut tasks = JoinSet::new();
        let mut aggregate = Aggregate::new(sink, scope.clone());

        let mut queue = items.into_iter();
        let mut dispatched = 0usize;

        'dispatch: while let Some(item) = queue.next() {
            let permit = loop {
                tokio::select! {
                    biased;
                    _ = scope.cancelled() => {
                        aggregate.fail(item.key(), CollectError::Cancelled);
                        break 'dispatch;
                    }
                    Some((seq, result)) = rx.recv() => aggregate.deliver(seq, result),
                    Ok(permit) = Arc::clone(&semaphore).acquire_owned() => break permit,
                }
            };

            let key = item.key();
            let seq = dispatched as u64;
            aggregate.track(seq, key.clone());
            let ctx = WorkerContext {
                executor: executor.clone(),
                describe: Arc::clone(&self.context),
                paginator: self.paginator,
                key: key.clone(),
            };
            let process = Arc::clone(&process);
            let pause = Arc::clone(&self.pause);
            let cancel = scope.clone();
            let tx = tx.clone();
            let task_span = info_span!("item", item = %key);

            tasks.spawn(
                async move {
                    let _permit = permit;
                    let result = run_item(ctx, item, process, &pause, &cancel).await;
                    // Receiver outlives every task
                    let _ = tx.send((seq, result));
                }
                .instrument(task_span),
            );
            dispatched += 1;
        }

        for item in queue {
            aggregate.fail(item.key(), CollectError::Cancelled);
        }

        drop(tx);
        while let Some((seq, result)) = rx.recv().await {
            aggregate.deliver(seq, result);
        }

        let mut join_failure = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed to join");
                join_failure.get_or_insert_with(|| e.to_string());
            }
        }
        // Tasks that died before reporting still owe their item a result
        aggregate.abandon(
            join_failure.as_deref().unwrap_or("worker task ended without a result"),
        );

        let finished_at = Utc::now();
        let (emitted, failures, halt) = aggregate.finish();
        info!(
            dispatched = dispatched,
            emitted = emitted,
            failed = failures.len(),
            duration_ms = (finished_at - started_at).num_milliseconds(),
            "Collection finished"
        );

        (
            CollectSummary {
                emitted,
                failures,
                started_at,
                finished_at,
            },
            halt,
        )
    }
}

async fn run_item<T, F, Fut>(
    ctx: WorkerContext,
    item: T,
    process: Arc<F>,
    pause: &PauseSignal,
    cancel: &CancelToken,
) -> Result<Resource, CollectError>
where
    F: Fn(WorkerContext, T) -> Fut,
    Fut: Future<Output = Result<Resource, CollectError>>,
{
    if cancel.is_cancelled() {
        return Err(CollectError::Cancelled);
    }
    pause.observe(cancel).await?;

    match AssertUnwindSafe(async move { (*process)(ctx, item).await })
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(CollectError::WorkerPanicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Single-writer accumulator on the collecting task.
struct Aggregate<'a, S: ?Sized> {
    sink: &'a mut S,
    scope: CancelToken,
    pending: HashMap<u64, String>,
    emitted: usize,
    failures: Vec<ItemFailure>,
    halt: Option<CollectError>,
}

impl<'a, S: ResourceSink + ?Sized> Aggregate<'a, S> {
    fn new(sink: &'a mut S, scope: CancelToken) -> Self {
        Self {
            sink,
            scope,
            pending: HashMap::new(),
            emitted: 0,
            failures: Vec::new(),
            halt: None,
        }
    }

    fn track(&mut self, seq: u64, key: String) {
        self.pending.insert(seq, key);
    }

    fn deliver(&mut self, seq: u64, result: Result<Resource, CollectError>) {
        let Some(key) = self.pending.remove(&seq) else {
            return;
        };
        match result {
            Ok(resource) => self.emit(key, resource),
            Err(error) => self.fail(key, error),
        }
    }

    fn emit(&mut self, key: String, resource: Resource) {
        if self.halt.is_some() {
            debug!(item = %key, "Sink halted, dropping resource");
            return;
        }
        match self.sink.emit(resource) {
            Ok(()) => {
                self.emitted += 1;
                metrics::record_item("success");
            }
            Err(err) => {
                error!(item = %key, error = %err, "Sink rejected resource, stopping collection");
                self.halt = Some(err);
                self.scope.cancel();
            }
        }
    }

    fn fail(&mut self, key: String, error: CollectError) {
        if error.is_cancelled() {
            metrics::record_item("cancelled");
            debug!(item = %key, "Item cancelled");
        } else {
            metrics::record_item("failure");
            warn!(item = %key, error = %error, "Item failed");
        }
        self.failures.push(ItemFailure { key, error });
    }

    fn abandon(&mut self, reason: &str) {
        let mut orphaned: Vec<_> = self.pending.drain().collect();
        orphaned.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, key) in orphaned {
            self.fail(key, CollectError::WorkerPanicked(reason.to_string()));
        }
    }

    fn finish(self) -> (usize, Vec<ItemFailure>, Option<CollectError>) {
        (self.emitted, self.failures, self.halt)
    }
}
