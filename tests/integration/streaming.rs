//! Integration tests for streaming emission

use inventory_crawler::{
    BufferSink, CollectError, Collector, DescribeContext, Resource, ResourceSink, StreamSink,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn collector(max_concurrency: usize) -> Collector {
    Collector::new(DescribeContext::new("us-east-1", "111122223333"))
        .with_rate_limit(1000.0, 1000)
        .with_max_concurrency(max_concurrency)
}

#[derive(Debug, thiserror::Error)]
#[error("downstream closed")]
struct DownstreamClosed;

#[tokio::test]
async fn test_sink_error_stops_emission() {
    let processed = Arc::new(AtomicUsize::new(0));
    let mut calls = 0usize;

    let result = {
        let mut sink = StreamSink::new(|_resource: Resource| {
            calls += 1;
            if calls == 3 {
                Err(DownstreamClosed)
            } else {
                Ok(())
            }
        });

        let processed = Arc::clone(&processed);
        collector(1)
            .collect_into(
                0usize..10,
                move |_, item| {
                    let processed = Arc::clone(&processed);
                    async move {
                        processed.fetch_add(1, Ordering::SeqCst);
                        Ok(Resource::new("us-east-1").with_id(item.to_string()))
                    }
                },
                &mut sink,
            )
            .await
    };

    let err = result.unwrap_err();
    assert!(matches!(err, CollectError::Sink(_)));
    assert!(err.downcast_inner::<DownstreamClosed>().is_some());
    assert_eq!(calls, 3);
    assert!(processed.load(Ordering::SeqCst) < 10);
}

#[tokio::test]
async fn test_sink_error_with_parallel_workers() {
    let mut calls = 0usize;
    let result = {
        let mut sink = StreamSink::new(|_resource: Resource| {
            calls += 1;
            if calls >= 3 {
                Err("stop")
            } else {
                Ok(())
            }
        });
        collector(8)
            .collect_into(
                0usize..50,
                |_, item| async move { Ok(Resource::new("us-east-1").with_id(item.to_string())) },
                &mut sink,
            )
            .await
    };

    assert!(matches!(result, Err(CollectError::Sink(_))));
    assert_eq!(calls, 3);
}

#[tokio::test]
async fn test_halted_run_leaves_collector_usable() {
    let collector = collector(2);
    let mut sink = StreamSink::new(|_resource: Resource| Err("closed"));
    let halted = collector
        .collect_into(
            vec!["a", "b"],
            |_, item: &'static str| async move { Ok(Resource::new("us-east-1").with_id(item)) },
            &mut sink,
        )
        .await;
    assert!(halted.is_err());
    assert!(!collector.cancel_token().is_cancelled());

    let report = collector
        .collect(vec!["c"], |_, item: &'static str| async move {
            Ok(Resource::new("us-east-1").with_id(item))
        })
        .await;
    assert!(report.is_complete());
    assert_eq!(report.resources.len(), 1);
}

struct CountingSink {
    ids: Vec<String>,
}

impl ResourceSink for CountingSink {
    fn emit(&mut self, resource: Resource) -> Result<(), CollectError> {
        self.ids.extend(resource.id);
        Ok(())
    }
}

#[tokio::test]
async fn test_custom_sink_receives_every_resource() {
    let mut sink = CountingSink { ids: Vec::new() };
    let summary = collector(4)
        .collect_into(
            0usize..20,
            |_, item| async move { Ok(Resource::new("us-east-1").with_id(item.to_string())) },
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(summary.emitted, 20);
    assert!(summary.is_complete());
    assert_eq!(sink.ids.len(), 20);
}

#[tokio::test]
async fn test_dyn_sink() {
    let mut buffer = BufferSink::new();
    let sink: &mut dyn ResourceSink = &mut buffer;
    let summary = collector(2)
        .collect_into(
            vec!["x".to_string()],
            |_, item| async move { Ok(Resource::new("us-east-1").with_name(item)) },
            sink,
        )
        .await
        .unwrap();

    assert_eq!(summary.emitted, 1);
    assert_eq!(buffer.resources()[0].name.as_deref(), Some("x"));
}
