//! Fallback, deadline, policy and dedup behavior across the pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Behaviour, MockProvider, MockTransport, article, ids, open_limiter, orchestrator, pipeline, result};
use sift_core::{Acquire, ProviderId, RateLimitConfig, RateLimiter, SearchRequest};

fn request() -> SearchRequest {
    SearchRequest::new("solar storage costs", 5)
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_a_hanging_provider() {
    let hanging = MockProvider::new("a", Behaviour::Never);
    let unused = MockProvider::new("b", Behaviour::Results(vec![result("b", "https://b.example/1", 1)]));
    let orchestrator = orchestrator(open_limiter(), &[hanging.clone(), unused.clone()])
        .with_deadline(Duration::from_secs(3));

    let started = tokio::time::Instant::now();
    let resolved = orchestrator.resolve(&request(), &ids(&["a", "b"])).await;

    assert!(started.elapsed() <= Duration::from_secs(3));
    assert!(resolved.results.is_empty());
    assert!(resolved.summary.deadline_exceeded);
    assert_eq!(resolved.summary.providers_attempted, ids(&["a"]));
    assert_eq!(unused.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_reports_deadline_as_degraded() {
    let slow_pages = Arc::new(
        MockTransport::new()
            .page("https://a.example/1", article("One", "Solar storage costs fell."))
            .delay(Duration::from_secs(120)),
    );
    let provider = MockProvider::new("a", Behaviour::Results(vec![result("a", "https://a.example/1", 1)]));
    let pipeline = pipeline(&[provider], slow_pages, &["a"]).with_fetch_limits(Duration::from_secs(300), 1 << 20);

    let resolution = pipeline.resolve(&request()).await.unwrap();
    assert!(resolution.summary.deadline_exceeded);
    assert!(resolution.documents.is_empty());
    assert!(resolution.is_degraded());
}

#[tokio::test]
async fn test_rate_limited_provider_falls_through() {
    let limited = MockProvider::new("a", Behaviour::RateLimited);
    let serving = MockProvider::new("b", Behaviour::Results(vec![result("b", "https://b.example/1", 1)]));
    let spare = MockProvider::new("c", Behaviour::Results(vec![result("c", "https://c.example/1", 1)]));
    let orchestrator = orchestrator(open_limiter(), &[limited.clone(), serving.clone(), spare.clone()]);

    let resolved = orchestrator.resolve(&request(), &ids(&["a", "b", "c"])).await;

    assert_eq!(resolved.served_by, Some(ProviderId::new("b")));
    assert_eq!(resolved.summary.providers_rate_limited, ids(&["a"]));
    assert_eq!(resolved.summary.providers_attempted, ids(&["a", "b"]));
    assert_eq!((limited.calls(), serving.calls(), spare.calls()), (1, 1, 0));
}

#[tokio::test]
async fn test_failures_are_summarized() {
    let down = MockProvider::new("a", Behaviour::Unavailable);
    let empty = MockProvider::new("b", Behaviour::Empty);
    let orchestrator = orchestrator(open_limiter(), &[down, empty]);

    let resolved = orchestrator.resolve(&request(), &ids(&["a", "b"])).await;

    assert!(resolved.results.is_empty());
    assert!(resolved.served_by.is_none());
    let failed: Vec<&str> = resolved.summary.providers_failed.iter().map(|f| f.provider_id.as_str()).collect();
    assert_eq!(failed, vec!["a", "b"]);
    assert!(!resolved.summary.deadline_exceeded);
}

#[tokio::test]
async fn test_locally_limited_provider_skipped_without_call() {
    let strict = RateLimitConfig { max_per_window: 1, window_ms: 60_000, min_interval_ms: 0 };
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()).with_override(ProviderId::new("a"), strict));
    assert_eq!(limiter.acquire(&ProviderId::new("a")), Acquire::Permit);

    let limited = MockProvider::new("a", Behaviour::Results(vec![result("a", "https://a.example/1", 1)]));
    let serving = MockProvider::new("b", Behaviour::Results(vec![result("b", "https://b.example/1", 1)]));
    let orchestrator = orchestrator(limiter, &[limited.clone(), serving]);

    let resolved = orchestrator.resolve(&request(), &ids(&["a", "b"])).await;

    assert_eq!(limited.calls(), 0);
    assert_eq!(resolved.summary.providers_rate_limited, ids(&["a"]));
    assert_eq!(resolved.summary.providers_attempted, ids(&["b"]));
    assert_eq!(resolved.served_by, Some(ProviderId::new("b")));
}

#[tokio::test(start_paused = true)]
async fn test_short_wait_backs_off_instead_of_skipping() {
    let spaced = RateLimitConfig { max_per_window: 10, window_ms: 60_000, min_interval_ms: 1_000 };
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()).with_override(ProviderId::new("a"), spaced));
    assert_eq!(limiter.acquire(&ProviderId::new("a")), Acquire::Permit);

    let provider = MockProvider::new("a", Behaviour::Results(vec![result("a", "https://a.example/1", 1)]));
    let orchestrator = orchestrator(limiter, &[provider.clone()]).with_max_backoff(Duration::from_secs(2));

    let started = tokio::time::Instant::now();
    let resolved = orchestrator.resolve(&request(), &ids(&["a"])).await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(provider.calls(), 1);
    assert_eq!(resolved.served_by, Some(ProviderId::new("a")));
    assert!(resolved.summary.providers_rate_limited.is_empty());
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let transport =
        Arc::new(MockTransport::new().page("https://a.example/1", article("One", "Solar storage costs fell.")));
    let provider = MockProvider::new("a", Behaviour::Results(vec![result("a", "https://a.example/1", 1)]));
    let pipeline = pipeline(&[provider.clone()], transport.clone(), &["a"]);

    let first = pipeline.resolve(&request()).await.unwrap();
    let second = pipeline.resolve(&SearchRequest::new("  Solar   STORAGE costs ", 5)).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(transport.page_calls(), 1);
    assert!(!first.summary.cache_hit);
    assert!(second.summary.cache_hit);
    assert_eq!(first.documents, second.documents);
}

#[tokio::test]
async fn test_policy_denial_makes_no_content_request() {
    let transport = Arc::new(
        MockTransport::new()
            .robots("blocked.example", "User-agent: *\nDisallow: /\n")
            .page("https://blocked.example/x", article("Blocked", "Solar storage costs are private."))
            .page("https://open.example/y", article("Open", "Solar storage costs fell sharply.")),
    );
    let provider = MockProvider::new(
        "a",
        Behaviour::Results(vec![result("a", "https://blocked.example/x", 1), result("a", "https://open.example/y", 2)]),
    );
    let pipeline = pipeline(&[provider], transport.clone(), &["a"]);

    let resolution = pipeline.resolve(&request()).await.unwrap();

    assert_eq!(transport.page_calls(), 1);
    assert_eq!(resolution.summary.providers_denied_by_policy, vec!["https://blocked.example/x".to_string()]);
    assert_eq!(resolution.documents.len(), 1);
    assert_eq!(resolution.documents[0].source_url, "https://open.example/y");
}

#[tokio::test]
async fn test_duplicates_keep_highest_priority_copy() {
    let text = "Solar storage costs dropped by a fifth over the year.";
    let transport = Arc::new(
        MockTransport::new()
            .page("https://wire.example/story", article("Wire", text))
            .page("https://mirror.example/story", article("Mirror", text))
            .status("https://gone.example/story", 404),
    );
    let provider = MockProvider::new(
        "a",
        Behaviour::Results(vec![
            result("a", "https://wire.example/story", 1),
            result("a", "https://wire.example/story", 2),
            result("a", "https://gone.example/story", 3),
            result("a", "https://mirror.example/story", 4),
        ]),
    );
    let pipeline = pipeline(&[provider], transport.clone(), &["a"]);

    let resolution = pipeline.resolve(&request()).await.unwrap();

    assert_eq!(transport.page_calls(), 3);
    assert_eq!(resolution.summary.fetch_failures, 1);
    assert_eq!(resolution.summary.total_documents, 1);
    let doc = &resolution.documents[0];
    assert_eq!(doc.source_url, "https://wire.example/story");
    assert_eq!(doc.priority, 0);
    assert_eq!(doc.provider_id.as_str(), "a");
}

#[tokio::test]
async fn test_pipeline_follows_given_order_not_alphabetical() {
    let transport = Arc::new(
        MockTransport::new()
            .page("https://zeta.example/1", article("Zeta", "Solar storage costs fell in the north."))
            .page("https://alpha.example/1", article("Alpha", "Solar storage costs fell in the south.")),
    );
    let zeta = MockProvider::new("zeta", Behaviour::Results(vec![result("zeta", "https://zeta.example/1", 1)]));
    let alpha = MockProvider::new("alpha", Behaviour::Results(vec![result("alpha", "https://alpha.example/1", 1)]));
    let pipeline = pipeline(&[alpha.clone(), zeta.clone()], transport, &["zeta", "alpha"]);

    let resolution = pipeline.resolve(&request()).await.unwrap();

    assert_eq!(pipeline.order(), ids(&["zeta", "alpha"]).as_slice());
    assert_eq!((zeta.calls(), alpha.calls()), (1, 0));
    assert_eq!(resolution.documents[0].provider_id.as_str(), "zeta");
}
