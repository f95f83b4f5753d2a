//! Search client behaviour against a scripted transport
//!
//! Covers cache hits, budget charging, retry and degraded retry, and the
//! split between recoverable outcomes and errors.

use factcheck_common::budget::QueryBudget;
use factcheck_common::config::SearchConfig;
use factcheck_common::error::{SearchError, TransportError};
use factcheck_common::search::{
    BudgetCharge, FakeSearchTransport, SearchCache, SearchClient, SearchOptions,
    TransportResponse,
};
use std::sync::Arc;
use std::time::Duration;

const BODY: &str = r#"{"results":{"web":[
    {"url":"https://data.gov/report","title":"Report","snippets":["Unemployment fell"]},
    {"url":"https://npr.org/story","title":"Story","description":"Jobs data"}
]}}"#;

fn setup(transport: FakeSearchTransport) -> (Arc<FakeSearchTransport>, SearchClient) {
    let transport = Arc::new(transport);
    let cache = Arc::new(SearchCache::new(Duration::from_secs(900), 200));
    let config = SearchConfig {
        backoff_ms: 0,
        ..SearchConfig::default()
    };
    let client = SearchClient::new(transport.clone(), cache, config, "v1");
    (transport, client)
}

fn options() -> SearchOptions {
    SearchOptions::new(12, "month")
}

#[tokio::test]
async fn cache_hit_spends_no_budget() {
    let (transport, client) = setup(FakeSearchTransport::always(BODY, 1));
    let mut budget = QueryBudget::new(10, 5);

    let first = client
        .search(
            "bill passed senate",
            &options(),
            Some(BudgetCharge {
                budget: &mut budget,
                claim_id: "c1",
            }),
        )
        .await
        .unwrap();
    assert!(!first.cached);
    assert_eq!(first.results.len(), 2);
    assert_eq!(first.results[0].snippet, "Unemployment fell");
    assert_eq!(budget.total_spent(), 1);

    let second = client
        .search(
            "bill passed senate",
            &options(),
            Some(BudgetCharge {
                budget: &mut budget,
                claim_id: "c1",
            }),
        )
        .await
        .unwrap();
    assert!(second.cached);
    assert_eq!(second.results, first.results);
    assert_eq!(budget.total_spent(), 1, "cache hit must not spend budget");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn allowlist_version_partitions_cache() {
    let (transport, client) = setup(FakeSearchTransport::always(BODY, 2));

    client.search("q", &options(), None).await.unwrap();
    let other = client
        .search("q", &options().with_allowlist_version("v2"), None)
        .await
        .unwrap();

    assert!(!other.cached);
    assert_eq!(transport.call_count(), 2);
    assert_eq!(client.cache().len(), 2);
}

#[tokio::test]
async fn server_error_with_livecrawl_retries_degraded() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Ok(TransportResponse::status(503)),
        Ok(TransportResponse::ok(BODY)),
    ]));
    let opts = options().with_livecrawl("all", "markdown");

    let outcome = client.search("q", &opts, None).await.unwrap();
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.error.is_none());

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].livecrawl.as_deref(), Some("all"));
    assert_eq!(requests[0].count, 12);
    assert_eq!(requests[1].livecrawl, None);
    assert_eq!(requests[1].livecrawl_formats, None);
    assert_eq!(requests[1].count, 4);
}

#[tokio::test]
async fn rate_limit_exhaustion_returns_empty_outcome() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Ok(TransportResponse::status(429)),
        Ok(TransportResponse::status(429)),
        Ok(TransportResponse::status(429)),
    ]));

    let outcome = client.search("q", &options(), None).await.unwrap();
    assert!(outcome.results.is_empty());
    assert!(outcome.error.as_deref().unwrap_or("").contains("429"));
    // One attempt plus max_retries
    assert_eq!(transport.call_count(), 3);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn server_error_recovers_on_retry() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Ok(TransportResponse::status(502)),
        Ok(TransportResponse::ok(BODY)),
    ]));

    let outcome = client.search("q", &options(), None).await.unwrap();
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(transport.call_count(), 2);
    // No livecrawl on the first request, so nothing was degraded
    assert_eq!(transport.requests()[1].count, 12);
}

#[tokio::test]
async fn client_error_is_rejected_without_retry() {
    let mut not_found = TransportResponse::status(404);
    not_found.request_id = Some("req-42".to_string());
    not_found.body = "no such endpoint".to_string();
    let (transport, client) = setup(FakeSearchTransport::new(vec![Ok(not_found)]));

    let err = client.search("q", &options(), None).await.unwrap_err();
    match err {
        SearchError::Rejected {
            status, request_id, ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(request_id.as_deref(), Some("req-42"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn transport_failures_error_after_retries() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Err(TransportError::Timeout),
        Err(TransportError::Network("connection reset".to_string())),
        Err(TransportError::Network("connection reset".to_string())),
    ]));

    let err = client.search("q", &options(), None).await.unwrap_err();
    assert!(matches!(err, SearchError::Transport(_)));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn transport_failure_then_success() {
    let (_, client) = setup(FakeSearchTransport::new(vec![
        Err(TransportError::Timeout),
        Ok(TransportResponse::ok(BODY)),
    ]));

    let outcome = client.search("q", &options(), None).await.unwrap();
    assert_eq!(outcome.results.len(), 2);
}

#[tokio::test]
async fn denied_budget_skips_provider() {
    let (transport, client) = setup(FakeSearchTransport::always(BODY, 2));
    let mut budget = QueryBudget::new(1, 5);

    client
        .search(
            "first",
            &options(),
            Some(BudgetCharge {
                budget: &mut budget,
                claim_id: "c1",
            }),
        )
        .await
        .unwrap();

    let denied = client
        .search(
            "second",
            &options(),
            Some(BudgetCharge {
                budget: &mut budget,
                claim_id: "c1",
            }),
        )
        .await
        .unwrap();
    assert!(denied.budget_exceeded);
    assert!(denied.results.is_empty());
    assert_eq!(budget.total_spent(), 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn failed_call_still_counts_against_budget() {
    let (_, client) = setup(FakeSearchTransport::new(vec![Ok(TransportResponse::status(400))]));
    let mut budget = QueryBudget::new(10, 5);

    let result = client
        .search(
            "q",
            &options(),
            Some(BudgetCharge {
                budget: &mut budget,
                claim_id: "c1",
            }),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(budget.spent_for("c1"), 1);
}

#[tokio::test]
async fn invalid_json_is_not_cached() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Ok(TransportResponse::ok("<html>oops</html>")),
        Ok(TransportResponse::ok(BODY)),
    ]));

    let outcome = client.search("q", &options(), None).await.unwrap();
    assert!(outcome.results.is_empty());
    assert!(outcome.error.is_some());
    assert!(client.cache().is_empty());

    let retry = client.search("q", &options(), None).await.unwrap();
    assert!(!retry.cached);
    assert_eq!(retry.results.len(), 2);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn server_error_exhaustion_returns_empty_outcome() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Ok(TransportResponse::status(500)),
        Ok(TransportResponse::status(502)),
        Ok(TransportResponse::status(503)),
    ]));

    let outcome = client.search("q", &options(), None).await.unwrap();
    assert!(outcome.results.is_empty());
    assert!(outcome.error.as_deref().unwrap_or("").contains("503"));
    assert_eq!(transport.call_count(), 3);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn degraded_request_stays_degraded_on_later_retries() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Ok(TransportResponse::status(503)),
        Ok(TransportResponse::status(503)),
        Ok(TransportResponse::ok(BODY)),
    ]));
    let opts = options().with_livecrawl("all", "markdown");

    let outcome = client.search("q", &opts, None).await.unwrap();
    assert_eq!(outcome.results.len(), 2);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    for degraded in &requests[1..] {
        assert_eq!(degraded.livecrawl, None);
        assert_eq!(degraded.livecrawl_formats, None);
        assert_eq!(degraded.count, 4);
    }
}

#[tokio::test]
async fn degraded_retry_counts_against_retry_cap() {
    let (transport, client) = setup(FakeSearchTransport::new(vec![
        Err(TransportError::Timeout),
        Err(TransportError::Timeout),
        Ok(TransportResponse::status(503)),
        Ok(TransportResponse::status(503)),
        Ok(TransportResponse::status(503)),
    ]));
    let opts = options().with_livecrawl("all", "markdown");

    let outcome = client.search("q", &opts, None).await.unwrap();
    assert!(outcome.results.is_empty());
    assert!(outcome.error.as_deref().unwrap_or("").contains("503"));
    // One attempt plus max_retries, degraded retry included
    assert_eq!(transport.call_count(), 3);
    assert_eq!(transport.requests()[2].livecrawl.as_deref(), Some("all"));
}
