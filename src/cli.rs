//! Command-line interface

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{CollectorConfig, MAX_CONCURRENCY_LIMIT};
use crate::error::CollectError;

/// Parse and validate concurrency value (1..=64)
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY_LIMIT {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY_LIMIT}"
        ));
    }
    Ok(value)
}

/// Parse a limiter rate (>= 1 token per second)
fn parse_rate(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if !value.is_finite() || value < 1.0 {
        return Err(format!("rate must be a finite value >= 1, got {s}"));
    }
    Ok(value)
}

/// Crawl organization accounts into a JSON inventory
#[derive(Debug, Parser)]
#[command(name = "inventory-crawler", version, about)]
pub struct Cli {
    /// Region recorded on every resource and used for API calls
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Account ID for the describe context (defaults to empty)
    #[arg(long, default_value = "")]
    pub account_id: String,

    /// JSON file with collector settings; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// API calls per second (default: 10)
    #[arg(long, value_parser = parse_rate)]
    pub rate: Option<f64>,

    /// Calls allowed in a burst (default: 10)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub burst: Option<u32>,

    /// Accounts processed concurrently (default: 10, range: 1-64)
    #[arg(long, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Retries per call after the first attempt (default: 5, range: 0-20)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: Option<u32>,

    /// Print one JSON resource per line as accounts complete
    #[arg(long, default_value_t = false)]
    pub stream: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Cancel the crawl after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl Cli {
    /// Collector settings from the config file (or defaults) with flag
    /// overrides applied.
    pub fn collector_config(&self) -> Result<CollectorConfig, CollectError> {
        let mut config = match &self.config {
            Some(path) => CollectorConfig::from_json_file(path)?,
            None => CollectorConfig::default(),
        };

        if let Some(rate) = self.rate {
            config.rate_limit = rate;
        }
        if let Some(burst) = self.burst {
            config.burst = burst;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }

        config.validate()?;
        Ok(config)
    }

    /// Crawl deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
