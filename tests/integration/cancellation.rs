//! Integration tests for cancellation of collection runs

use inventory_crawler::{
    CancelToken, CollectError, Collector, DescribeContext, Resource, ServiceError,
};
use std::time::Duration;
use tokio::time::Instant;

fn collector() -> Collector {
    Collector::new(DescribeContext::new("us-west-2", "111122223333"))
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unwinds_in_flight_and_skips_pending() {
    let collector = collector().with_max_concurrency(2);
    collector.cancel_token().cancel_after(Duration::from_secs(1));
    let start = Instant::now();

    let report = collector
        .collect(0usize..10, |ctx, item| async move {
            ctx.cancel_token().sleep(Duration::from_secs(60)).await?;
            Ok(Resource::new("us-west-2").with_id(item.to_string()))
        })
        .await;

    assert!(start.elapsed() < Duration::from_secs(60));
    assert!(report.resources.is_empty());
    assert_eq!(report.failures.len(), 10);
    assert!(report.failures.iter().all(|f| f.error.is_cancelled()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_limiter_wait() {
    let token = CancelToken::new();
    let collector = collector()
        .with_rate_limit(1.0, 1)
        .with_max_concurrency(5)
        .with_cancel_token(token.clone());
    token.cancel_after(Duration::from_millis(1500));

    let report = collector
        .collect(0usize..5, |ctx, item| async move {
            ctx.call(|| async { Ok::<_, ServiceError>(()) }).await?;
            Ok(Resource::new("us-west-2").with_id(item.to_string()))
        })
        .await;

    // One token up front, one more after a second
    assert_eq!(report.resources.len(), 2);
    assert_eq!(report.failures.len(), 3);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.error, CollectError::Cancelled)));
}

#[tokio::test]
async fn test_external_token_shared_between_collectors() {
    let token = CancelToken::new();
    let first = collector().with_cancel_token(token.clone());
    let second = collector().with_cancel_token(token.clone());
    token.cancel();

    assert!(first.cancel_token().is_cancelled());
    assert!(second.cancel_token().is_cancelled());

    let result: Result<(), CollectError> = first
        .executor()
        .execute(|| async { Ok::<_, ServiceError>(()) })
        .await;
    assert!(matches!(result, Err(CollectError::Cancelled)));
}
