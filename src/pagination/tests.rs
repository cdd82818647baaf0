//! Tests for pagination module

use super::*;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::SessionManager;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use test_case::test_case;

/// In-memory collection of `available` integers `0..available`
struct FakeSource {
    available: usize,
    reported_total: Option<usize>,
    fail_at: Option<usize>,
    delays: Vec<(usize, Duration)>,
    calls: Mutex<Vec<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    fn new(available: usize) -> Self {
        Self {
            available,
            reported_total: Some(available),
            fail_at: None,
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn reported_total(mut self, total: Option<usize>) -> Self {
        self.reported_total = total;
        self
    }

    fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    fn delay(mut self, index: usize, delay: Duration) -> Self {
        self.delays.push((index, delay));
        self
    }

    async fn fetch(&self, request: PageRequest) -> Result<PageResult<usize>> {
        self.calls.lock().unwrap().push(request.cursor);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .iter()
            .find(|(index, _)| *index == request.index)
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_at == Some(request.index) {
            return Err(Error::http_status(500, format!("page {} exploded", request.index)));
        }

        let start = request.cursor.min(self.available);
        let end = (request.cursor + request.page_size).min(self.available);
        Ok(PageResult::new((start..end).collect(), self.reported_total))
    }

    fn cursors(&self) -> Vec<usize> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_unstable();
        calls
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn engine(concurrency: usize) -> PaginationEngine {
    PaginationEngine::new(
        PaginationConfig::default()
            .with_concurrency(concurrency)
            .with_page_timeout(None),
    )
}

// ============================================================================
// Exact page counts
// ============================================================================

#[test_case(10, 25, 100, &[0, 10, 20], 25, false; "limit below total")]
#[test_case(10, 100, 25, &[0, 10, 20], 25, true; "total below limit")]
#[test_case(10, 10, 100, &[0], 10, false; "single full page")]
#[test_case(10, 5, 100, &[0], 5, false; "first page exceeds limit")]
#[test_case(7, 30, 30, &[0, 7, 14, 21, 28], 30, false; "uneven page size")]
#[test_case(10, 30, 30, &[0, 10, 20], 30, false; "exact multiple")]
#[tokio::test]
async fn test_fetch_collection_exact_pages(
    page_size: usize,
    limit: usize,
    total: usize,
    cursors: &[usize],
    expected_len: usize,
    truncated: bool,
) {
    let source = FakeSource::new(total);

    let collection = engine(4)
        .fetch_collection(|r| source.fetch(r), page_size, limit)
        .await
        .unwrap();

    assert_eq!(source.cursors(), cursors);
    assert_eq!(collection.fetched_count, expected_len);
    assert_eq!(collection.elements, (0..expected_len).collect::<Vec<_>>());
    assert_eq!(collection.truncated, truncated);
    assert_eq!(collection.requested_limit, Some(limit));
    assert_eq!(collection.pages_fetched, cursors.len());
}

#[tokio::test]
async fn test_limit_zero_issues_no_fetch() {
    let source = FakeSource::new(100);

    let collection = engine(4)
        .fetch_collection(|r| source.fetch(r), 10, 0)
        .await
        .unwrap();

    assert!(collection.is_empty());
    assert!(!collection.truncated);
    assert_eq!(collection.pages_fetched, 0);
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_page_size_zero_is_rejected() {
    let source = FakeSource::new(100);

    let err = engine(4)
        .fetch_collection(|r| source.fetch(r), 0, 25)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CollectionError::Failed(Error::InvalidPageSize { page_size: 0 })
    ));
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_reported_total_zero_stops_after_first_page() {
    let source = FakeSource::new(0);

    let collection = engine(4)
        .fetch_collection(|r| source.fetch(r), 10, 25)
        .await
        .unwrap();

    assert!(collection.is_empty());
    assert_eq!(source.cursors(), vec![0]);
}

// ============================================================================
// Short pages
// ============================================================================

#[tokio::test]
async fn test_short_page_stops_issuing() {
    let source = FakeSource::new(15).reported_total(None);

    let collection = engine(1)
        .fetch_collection(|r| source.fetch(r), 10, 50)
        .await
        .unwrap();

    assert_eq!(source.cursors(), vec![0, 10]);
    assert_eq!(collection.elements, (0..15).collect::<Vec<_>>());
    assert!(collection.truncated);
}

#[tokio::test]
async fn test_short_first_page_returns_immediately() {
    let source = FakeSource::new(4).reported_total(None);

    let collection = engine(4)
        .fetch_collection(|r| source.fetch(r), 10, 50)
        .await
        .unwrap();

    assert_eq!(source.cursors(), vec![0]);
    assert_eq!(collection.fetched_count, 4);
    assert!(collection.truncated);
}

#[tokio::test]
async fn test_short_page_with_concurrency_keeps_order() {
    let source = FakeSource::new(23).reported_total(None);

    let collection = engine(4)
        .fetch_collection(|r| source.fetch(r), 10, 100)
        .await
        .unwrap();

    assert_eq!(collection.elements, (0..23).collect::<Vec<_>>());
    assert!(collection.truncated);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_first_page_failure_propagates() {
    let source = FakeSource::new(100).fail_at(0);

    let err = engine(4)
        .fetch_collection(|r| source.fetch(r), 10, 50)
        .await
        .unwrap_err();

    match err {
        CollectionError::Failed(Error::HttpStatus { status, .. }) => assert_eq!(status, 500),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(source.call_count(), 1);
}

#[test_case(1; "sequential")]
#[test_case(4; "concurrent")]
#[tokio::test]
async fn test_partial_failure_keeps_prefix(concurrency: usize) {
    // Page 3 of 5 fails
    let source = FakeSource::new(100).fail_at(2);

    let err = engine(concurrency)
        .fetch_collection(|r| source.fetch(r), 10, 50)
        .await
        .unwrap_err();

    let CollectionError::Partial(partial) = err else {
        panic!("expected a partial result");
    };
    assert_eq!(partial.partial.elements, (0..20).collect::<Vec<_>>());
    assert_eq!(partial.partial.fetched_count, 20);
    assert!(partial.partial.truncated);
    assert_eq!(partial.partial.pages_fetched, 2);
    assert_eq!(partial.cursor, 20);
    assert_eq!(partial.page_index, 2);
    assert!(matches!(partial.cause, Error::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_partial_failure_ignores_later_successes() {
    // Page 2 is slow and fails; pages 3 and 4 finish first
    let source = FakeSource::new(100)
        .fail_at(1)
        .delay(1, Duration::from_millis(80));

    let err = engine(4)
        .fetch_collection(|r| source.fetch(r), 10, 50)
        .await
        .unwrap_err();

    let partial = err.into_partial().unwrap();
    assert_eq!(partial.elements, (0..10).collect::<Vec<_>>());
    assert!(partial.truncated);
}

#[tokio::test]
async fn test_page_timeout_counts_as_failure() {
    let source = FakeSource::new(100).delay(2, Duration::from_millis(500));
    let engine = PaginationEngine::new(
        PaginationConfig::default()
            .with_concurrency(2)
            .with_page_timeout(Some(Duration::from_millis(50))),
    );

    let err = engine
        .fetch_collection(|r| source.fetch(r), 10, 50)
        .await
        .unwrap_err();

    let CollectionError::Partial(partial) = err else {
        panic!("expected a partial result");
    };
    assert!(matches!(partial.cause, Error::Timeout { timeout_ms: 50 }));
    assert_eq!(partial.page_index, 2);
    assert_eq!(partial.partial.fetched_count, 20);
}

#[tokio::test]
async fn test_collection_error_converts_to_crate_error() {
    let source = FakeSource::new(100).fail_at(3);

    async fn collect(source: &FakeSource) -> Result<AggregatedCollection<usize>> {
        Ok(engine(2)
            .fetch_collection(|r| source.fetch(r), 10, 50)
            .await?)
    }

    match collect(&source).await.unwrap_err() {
        Error::PartialPageFailure {
            cursor,
            page_index,
            fetched,
            source,
        } => {
            assert_eq!(cursor, 30);
            assert_eq!(page_index, 3);
            assert_eq!(fetched, 30);
            assert!(matches!(*source, Error::HttpStatus { status: 500, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_distinguishable() {
    let err = engine(2)
        .fetch_collection(
            |_| async {
                Err::<PageResult<usize>, _>(Error::RateLimited {
                    retry_after_seconds: 5,
                })
            },
            10,
            50,
        )
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    assert!(Error::from(err).is_rate_limited());
}

// ============================================================================
// Ordering and concurrency
// ============================================================================

#[tokio::test]
async fn test_out_of_order_completion_is_merged_in_order() {
    let source = FakeSource::new(50)
        .delay(1, Duration::from_millis(90))
        .delay(2, Duration::from_millis(60))
        .delay(3, Duration::from_millis(30));

    let collection = engine(4)
        .fetch_collection(|r| source.fetch(r), 10, 50)
        .await
        .unwrap();

    assert_eq!(collection.elements, (0..50).collect::<Vec<_>>());
    assert!(!collection.truncated);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let mut source = FakeSource::new(80);
    for index in 1..8 {
        source = source.delay(index, Duration::from_millis(20));
    }

    let collection = engine(2)
        .fetch_collection(|r| source.fetch(r), 10, 80)
        .await
        .unwrap();

    assert_eq!(collection.fetched_count, 80);
    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reported_total_is_snapshot_from_first_page() {
    let calls = AtomicUsize::new(0);
    let fetch = |request: PageRequest| {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            let total = if call == 0 { 30 } else { 1000 };
            let elements: Vec<usize> =
                (request.cursor..request.cursor + request.page_size).collect();
            Ok::<_, Error>(PageResult::new(elements, Some(total)))
        }
    };

    let collection = engine(4).fetch_collection(fetch, 10, 100).await.unwrap();

    assert_eq!(collection.fetched_count, 30);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

// ============================================================================
// Page cap and fetch_all
// ============================================================================

#[tokio::test]
async fn test_max_pages_caps_collection() {
    let source = FakeSource::new(100);
    let engine = PaginationEngine::new(
        PaginationConfig::default()
            .with_max_pages(3)
            .with_page_timeout(None),
    );

    let collection = engine
        .fetch_collection(|r| source.fetch(r), 10, 100)
        .await
        .unwrap();

    assert_eq!(source.cursors(), vec![0, 10, 20]);
    assert_eq!(collection.fetched_count, 30);
    assert!(collection.truncated);
}

#[tokio::test]
async fn test_fetch_all_uses_reported_total() {
    let source = FakeSource::new(35);

    let collection = engine(4)
        .fetch_all(|r| source.fetch(r), 10)
        .await
        .unwrap();

    assert_eq!(source.cursors(), vec![0, 10, 20, 30]);
    assert_eq!(collection.elements, (0..35).collect::<Vec<_>>());
    assert_eq!(collection.requested_limit, None);
    assert!(!collection.truncated);
}

#[tokio::test]
async fn test_fetch_all_without_total_stops_on_short_page() {
    let source = FakeSource::new(25).reported_total(None);

    let collection = engine(1)
        .fetch_all(|r| source.fetch(r), 10)
        .await
        .unwrap();

    assert_eq!(source.cursors(), vec![0, 10, 20]);
    assert_eq!(collection.fetched_count, 25);
    assert!(!collection.truncated);
}

#[tokio::test]
async fn test_fetch_all_without_total_hits_cap() {
    let source = FakeSource::new(10_000).reported_total(None);
    let engine = PaginationEngine::new(
        PaginationConfig::default()
            .with_max_pages(4)
            .with_page_timeout(None),
    );

    let collection = engine.fetch_all(|r| source.fetch(r), 10).await.unwrap();

    assert_eq!(collection.fetched_count, 40);
    assert_eq!(source.call_count(), 4);
    assert!(collection.truncated);
}

// ============================================================================
// Types
// ============================================================================

#[test]
fn test_page_request_cursor() {
    let request = PageRequest::nth(3, 25);
    assert_eq!(request.cursor, 75);
    assert_eq!(request.index, 3);
}

#[test]
fn test_pagination_config_from_client_config() {
    let client = ClientConfig::builder()
        .page_size(25)
        .concurrency(3)
        .max_pages(7)
        .timeouts(5, 12, 5)
        .build();

    let config = PaginationConfig::from(&client);
    assert_eq!(config.page_size, 25);
    assert_eq!(config.concurrency, 3);
    assert_eq!(config.max_pages, 7);
    assert_eq!(config.page_timeout, Some(Duration::from_secs(12)));
}

#[test]
fn test_collection_error_display() {
    let err: CollectionError<usize> = CollectionError::Partial(PartialCollection {
        partial: AggregatedCollection::new(vec![1, 2], Some(10), 1, false),
        cause: Error::Timeout { timeout_ms: 50 },
        cursor: 10,
        page_index: 1,
    });
    assert_eq!(
        err.to_string(),
        "Page 1 at cursor 10 failed after 2 elements: Request timeout after 50ms"
    );
}

// ============================================================================
// Remote collection
// ============================================================================

fn session() -> SessionManager {
    SessionManager::from_config(ClientConfig::default()).unwrap()
}

#[test]
fn test_remote_page_path() {
    let session = session();
    let collection = RemoteCollection::new(&session, "/search/blended").param("keywords", "rust dev");

    assert_eq!(
        collection.page_path(PageRequest::nth(2, 10)),
        "/search/blended?keywords=rust+dev&start=20&count=10"
    );

    let collection = RemoteCollection::new(&session, "/feed?q=chronFeed").cursor_params("offset", "limit");
    assert_eq!(
        collection.page_path(PageRequest::nth(0, 5)),
        "/feed?q=chronFeed&offset=0&limit=5"
    );
}

#[test]
fn test_remote_parse_page() {
    let session = session();
    let collection = RemoteCollection::new(&session, "/connections");

    let page = collection
        .parse_page(&json!({
            "elements": [{ "id": 1 }, { "id": 2 }],
            "paging": { "start": 0, "count": 2, "total": 17 }
        }))
        .unwrap();
    assert_eq!(page.elements.len(), 2);
    assert_eq!(page.reported_total, Some(17));

    let page = collection.parse_page(&json!({ "paging": {} })).unwrap();
    assert!(page.elements.is_empty());
    assert_eq!(page.reported_total, None);

    assert!(matches!(
        collection.parse_page(&json!({ "elements": "nope" })),
        Err(Error::Decode { .. })
    ));
    assert!(matches!(
        collection.parse_page(&json!([1, 2, 3])),
        Err(Error::Decode { .. })
    ));
}

#[test]
fn test_remote_custom_paths() {
    let session = session();
    let collection = RemoteCollection::new(&session, "/x")
        .elements_path("data.items")
        .total_path("$.data.count");

    let page = collection
        .parse_page(&json!({ "data": { "items": [1, 2, 3], "count": 3 } }))
        .unwrap();
    assert_eq!(page.elements, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(page.reported_total, Some(3));
}
