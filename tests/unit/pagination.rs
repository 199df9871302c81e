//! Unit tests for the pagination driver

use inventory_crawler::{
    CollectError, Collector, DescribeContext, Page, Paginator, RetryPolicy, ServiceError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Helper struct to track fetch calls
#[derive(Clone, Default)]
struct FetchTracker {
    cursors: Arc<Mutex<Vec<Option<String>>>>,
}

impl FetchTracker {
    fn record(&self, cursor: &Option<String>) {
        self.cursors.lock().unwrap().push(cursor.clone());
    }

    fn calls(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_cursor_chain_fetches_in_order() {
    let tracker = FetchTracker::default();

    let pages = Paginator::default()
        .retrieve_all(|cursor| {
            tracker.record(&cursor);
            async move {
                Ok(match cursor.as_deref() {
                    None => Some("1".to_string()),
                    Some("1") => Some("2".to_string()),
                    Some("2") => Some("3".to_string()),
                    _ => None,
                })
            }
        })
        .await
        .unwrap();

    assert_eq!(pages, 4);
    assert_eq!(
        tracker.calls(),
        vec![
            None,
            Some("1".to_string()),
            Some("2".to_string()),
            Some("3".to_string())
        ]
    );
}

#[tokio::test]
async fn test_error_propagated_unchanged() {
    let tracker = FetchTracker::default();

    let result = Paginator::default()
        .retrieve_all(|cursor| {
            tracker.record(&cursor);
            async move {
                match cursor {
                    None => Ok(Some("next".to_string())),
                    Some(_) => Err(CollectError::describe(ServiceError::new(
                        "InvalidNextTokenException",
                        "expired",
                    ))),
                }
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, CollectError::Describe(_)));
    assert_eq!(
        err.downcast_inner::<ServiceError>().unwrap().code,
        "InvalidNextTokenException"
    );
    // No fetch after the failing one
    assert_eq!(tracker.calls().len(), 2);
}

#[tokio::test]
async fn test_non_terminating_cursor_capped() {
    let tracker = FetchTracker::default();

    let result = Paginator::new(Some(25))
        .retrieve_all(|cursor| {
            tracker.record(&cursor);
            async { Ok(Some("same-token".to_string())) }
        })
        .await;

    assert!(matches!(
        result,
        Err(CollectError::PageLimitExceeded { max_pages: 25 })
    ));
    assert_eq!(tracker.calls().len(), 25);
}

#[tokio::test]
async fn test_unbounded_follows_long_listing() {
    let paginator = Paginator::unbounded();
    assert_eq!(paginator.max_pages(), None);

    let pages = paginator
        .retrieve_all(|cursor| async move {
            let n: usize = cursor.as_deref().map_or(0, |c| c.parse().unwrap());
            Ok((n < 49).then(|| (n + 1).to_string()))
        })
        .await
        .unwrap();
    assert_eq!(pages, 50);

    let capped = Paginator::new(Some(10))
        .retrieve_all(|cursor| async move {
            let n: usize = cursor.as_deref().map_or(0, |c| c.parse().unwrap());
            Ok((n < 49).then(|| (n + 1).to_string()))
        })
        .await;
    assert!(capped.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_page_fetch_wrapped_by_executor() {
    let collector = Collector::new(DescribeContext::new("us-east-1", "111122223333"))
        .with_policy(RetryPolicy::default().with_delays(Duration::ZERO, Duration::ZERO));
    let executor = collector.executor();
    let executor = &executor;
    let failures = Arc::new(Mutex::new(0usize));

    let items = collector
        .paginator()
        .list_all(|cursor| {
            let failures = Arc::clone(&failures);
            async move {
                executor
                    .execute(|| {
                        let cursor = cursor.clone();
                        let failures = Arc::clone(&failures);
                        async move {
                            let mut failures = failures.lock().unwrap();
                            // The first two attempts are throttled
                            if *failures < 2 {
                                *failures += 1;
                                return Err(ServiceError::throttled());
                            }
                            Ok(match cursor.as_deref() {
                                None => Page::new(vec!["a", "b"], Some("p2".to_string())),
                                _ => Page::last(vec!["c"]),
                            })
                        }
                    })
                    .await
            }
        })
        .await
        .unwrap();

    assert_eq!(items, vec!["a", "b", "c"]);
    assert_eq!(*failures.lock().unwrap(), 2);
}
