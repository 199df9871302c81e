//! Collector metrics
//!
//! Counters, gauges and histograms for API calls, retries, throttling and
//! limiter health, recorded through the `metrics` facade. Nothing is
//! exported until [`init_metrics`] installs the Prometheus exporter; before
//! that every recording is a no-op.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::BoxError;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// Install the Prometheus exporter and register metric descriptions.
///
/// Idempotent: later calls return `Ok(())` without rebinding.
///
/// # Arguments
/// * `addr` - Socket address of the scrape endpoint (e.g. "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), BoxError> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "collector_api_calls_total",
        Unit::Count,
        "External API call attempts issued after a limiter wait"
    );
    describe_counter!(
        "collector_retries_total",
        Unit::Count,
        "Failed calls scheduled for another attempt"
    );
    describe_counter!(
        "collector_throttles_total",
        Unit::Count,
        "Calls rejected with a throttling error code"
    );
    describe_gauge!(
        "collector_rate_limit",
        Unit::Count,
        "Current limiter refill rate in tokens per second"
    );
    describe_histogram!(
        "collector_limiter_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a limiter token"
    );
    describe_histogram!(
        "collector_retry_backoff_seconds",
        Unit::Seconds,
        "Backoff slept before a retry"
    );
    describe_counter!(
        "collector_items_total",
        Unit::Count,
        "Work items finished, by outcome"
    );
    describe_counter!(
        "collector_pages_total",
        Unit::Count,
        "Listing pages fetched"
    );

    *initialized = true;
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Check if the exporter is installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record one call attempt.
pub fn record_api_call() {
    counter!("collector_api_calls_total").increment(1);
}

/// Record a retry and the backoff preceding it.
pub fn record_retry(attempt: u32, backoff: Duration) {
    counter!("collector_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("collector_retry_backoff_seconds").record(backoff.as_secs_f64());
}

/// Record a throttling error.
pub fn record_throttle() {
    counter!("collector_throttles_total").increment(1);
}

/// Record the limiter's current rate.
pub fn record_rate_limit(rate: f64) {
    gauge!("collector_rate_limit").set(rate);
}

/// Record a completed limiter wait.
pub fn record_limiter_wait(wait: Duration) {
    histogram!("collector_limiter_wait_seconds").record(wait.as_secs_f64());
    if wait > Duration::from_millis(100) {
        debug!(wait_ms = wait.as_millis() as u64, "Limiter token acquired after wait");
    }
}

/// Record a finished work item (`success`, `failure` or `cancelled`).
pub fn record_item(outcome: &'static str) {
    counter!("collector_items_total", "outcome" => outcome).increment(1);
}

/// Record a fetched page.
pub fn record_page() {
    counter!("collector_pages_total").increment(1);
}
