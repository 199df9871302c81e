use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_sdk_organizations::config::Region;
use clap::Parser;
use inventory_crawler::accounts::aws::SdkOrganizations;
use inventory_crawler::accounts::crawl_accounts;
use inventory_crawler::cli::Cli;
use inventory_crawler::logging::init_tracing;
use inventory_crawler::metrics::init_metrics;
use inventory_crawler::{
    BufferSink, CancelToken, CollectSummary, Collector, DescribeContext, Resource, StreamSink,
};
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Crawl failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr)
            .await
            .map_err(|e| anyhow::anyhow!(e))
            .context("metrics exporter")?;
    }

    let config = cli.collector_config()?;

    let cancel = CancelToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - cancelling crawl");
                cancel.cancel();
            }
        }
    });
    if let Some(timeout) = cli.timeout() {
        cancel.cancel_after(timeout);
    }

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(cli.region.clone()))
        .load()
        .await;
    let api = Arc::new(SdkOrganizations::new(&sdk_config));

    let collector = Collector::from_config(
        &config,
        DescribeContext::new(cli.region.clone(), cli.account_id.clone()),
    )?
    .with_cancel_token(cancel);

    info!(
        region = %cli.region,
        rate = config.rate_limit,
        concurrency = config.max_concurrency,
        stream = cli.stream,
        "Starting organization account crawl"
    );

    let summary = if cli.stream {
        let stdout = std::io::stdout();
        let mut sink = StreamSink::new(|resource: Resource| -> anyhow::Result<()> {
            let mut out = stdout.lock();
            serde_json::to_writer(&mut out, &resource)?;
            writeln!(out)?;
            Ok(())
        });
        crawl_accounts(&collector, api, &mut sink).await?
    } else {
        let mut sink = BufferSink::new();
        let summary = crawl_accounts(&collector, api, &mut sink).await?;
        println!("{}", serde_json::to_string_pretty(sink.resources())?);
        summary
    };

    report(&summary);
    Ok(())
}

fn report(summary: &CollectSummary) {
    for failure in &summary.failures {
        error!(account = %failure.key, error = %failure.error, "Account failed");
    }
    info!(
        emitted = summary.emitted,
        failed = summary.failures.len(),
        duration_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
        "Crawl finished"
    );
}
