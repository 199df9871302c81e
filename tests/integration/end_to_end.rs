//! End-to-end crawl: two listing pages of two items, one item failing

use inventory_crawler::{
    BufferSink, CollectError, Collector, DescribeContext, Page, Resource, RetryPolicy,
    ServiceError, StreamSink, WorkerContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn collector() -> Collector {
    Collector::new(DescribeContext::new("ap-northeast-2", "111122223333"))
        .with_rate_limit(100.0, 10)
        .with_max_concurrency(2)
        .with_policy(
            RetryPolicy::default()
                .with_max_retries(2)
                .with_delays(Duration::from_millis(10), Duration::from_millis(100)),
        )
}

async fn list_page(cursor: Option<String>) -> Result<Page<String>, ServiceError> {
    match cursor.as_deref() {
        None => Ok(Page::new(
            vec!["a1".to_string(), "a2".to_string()],
            Some("page-2".to_string()),
        )),
        Some("page-2") => Ok(Page::last(vec!["b1".to_string(), "b2".to_string()])),
        Some(other) => Err(ServiceError::new("InvalidInputException", other)),
    }
}

async fn enrich(ctx: WorkerContext, item: String) -> Result<Resource, CollectError> {
    let tags = ctx
        .call(|| {
            let item = item.clone();
            async move {
                if item == "b2" {
                    Err(ServiceError::new("InternalFailure", "tag lookup failed"))
                } else {
                    Ok(vec![format!("owner:{item}")])
                }
            }
        })
        .await?;

    Resource::new(&ctx.describe().region)
        .with_arn(ctx.describe().arn("svc", &item))
        .with_id(item)
        .with_description(&tags)
}

fn assert_failure(failures: &[inventory_crawler::ItemFailure]) {
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].key, "b2");
    assert!(matches!(
        failures[0].error,
        CollectError::MaxRetriesReached { attempts: 3, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_buffering_mode() {
    let collector = collector();
    let cursors = Mutex::new(Vec::new());
    let mut sink = BufferSink::new();

    let summary = collector
        .crawl(
            |cursor| {
                cursors.lock().unwrap().push(cursor.clone());
                list_page(cursor)
            },
            enrich,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(
        *cursors.lock().unwrap(),
        vec![None, Some("page-2".to_string())]
    );
    assert_eq!(summary.emitted, 3);
    assert_failure(&summary.failures);

    let mut ids: Vec<_> = sink
        .resources()
        .iter()
        .filter_map(|r| r.id.clone())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a1", "a2", "b1"]);
    assert!(sink.resources().iter().all(|r| r.region == "ap-northeast-2"));
}

#[tokio::test(start_paused = true)]
async fn test_streaming_mode() {
    let collector = collector();
    let mut streamed = Vec::new();

    let summary = {
        let mut sink = StreamSink::new(|resource: Resource| -> Result<(), CollectError> {
            streamed.push(resource);
            Ok(())
        });
        let summary = collector.crawl(list_page, enrich, &mut sink).await.unwrap();
        assert_eq!(sink.emitted(), 3);
        summary
    };

    assert_eq!(streamed.len(), 3);
    assert_eq!(summary.emitted, 3);
    assert_failure(&summary.failures);
    assert!(streamed.iter().all(Resource::is_identifiable));
}

#[tokio::test(start_paused = true)]
async fn test_listing_failure_is_terminal() {
    let collector = collector();
    let processed = Arc::new(AtomicUsize::new(0));
    let mut sink = BufferSink::new();
    let counter = Arc::clone(&processed);

    let result = collector
        .crawl(
            |_cursor| async { Err::<Page<String>, _>(ServiceError::new("InternalFailure", "down")) },
            move |ctx, item| {
                counter.fetch_add(1, Ordering::SeqCst);
                enrich(ctx, item)
            },
            &mut sink,
        )
        .await;

    assert!(matches!(
        result,
        Err(CollectError::MaxRetriesReached { attempts: 3, .. })
    ));
    assert_eq!(processed.load(Ordering::SeqCst), 0);
    assert!(sink.is_empty());
}
