//! End-to-end research run over mock providers and pages.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Behaviour, MockProvider, MockTransport, article, ids, pipeline, result};
use sift_core::SearchRequest;

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[tokio::test]
async fn test_rate_limited_head_falls_back_and_ranks() {
    let strong = "Renewable energy 2024 capacity additions broke records, and renewable energy 2024 targets rose.";
    let partial = "Renewable capacity grew across most regions during the year.";
    let unrelated = "Markets were quiet and trading volumes stayed low.";

    let transport = Arc::new(
        MockTransport::new()
            .page("https://agency.example/report", article("Agency report", strong))
            .page("https://syndicate.example/report", article("Syndicated report", strong))
            .page("https://trade.example/growth", article("Growth", partial))
            .page("https://aggregator.example/growth", article("Growth (copy)", partial))
            .page("https://markets.example/today", article("Markets", unrelated)),
    );

    let head = MockProvider::new("a", Behaviour::RateLimited);
    let fallback = MockProvider::new(
        "b",
        Behaviour::Results(vec![
            result("b", "https://markets.example/today", 1),
            result("b", "https://agency.example/report", 2),
            result("b", "https://syndicate.example/report", 3),
            result("b", "https://trade.example/growth", 4),
            result("b", "https://aggregator.example/growth", 5),
        ]),
    );
    let last = MockProvider::new("c", Behaviour::Results(vec![result("c", "https://c.example/1", 1)]));

    let pipeline = pipeline(&[head.clone(), fallback.clone(), last.clone()], transport.clone(), &["a", "b", "c"]);
    let request = SearchRequest::new("renewable energy 2024", 3).with_recency_window(WEEK);

    let resolution = pipeline.resolve(&request).await.unwrap();

    assert_eq!((head.calls(), fallback.calls(), last.calls()), (1, 1, 0));
    assert_eq!(transport.page_calls(), 5);

    let urls: Vec<&str> = resolution.documents.iter().map(|d| d.source_url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://agency.example/report", "https://trade.example/growth", "https://markets.example/today"]
    );
    assert!(resolution.documents.iter().all(|d| d.provider_id.as_str() == "b"));
    assert!(resolution.documents.windows(2).all(|w| w[0].relevance_score >= w[1].relevance_score));
    assert!(resolution.documents.iter().all(|d| (0.0..=1.0).contains(&d.relevance_score)));
    assert_eq!(resolution.documents[0].title.as_deref(), Some("Agency report"));

    let summary = &resolution.summary;
    assert_eq!(summary.providers_attempted, ids(&["a", "b"]));
    assert_eq!(summary.providers_rate_limited, ids(&["a"]));
    assert!(summary.providers_failed.is_empty());
    assert_eq!(summary.total_documents, 3);
    assert_eq!(summary.fetch_failures, 0);
    assert!(!summary.cache_hit);
    assert!(!resolution.is_degraded());
}

#[tokio::test]
async fn test_exhausted_chain_returns_empty_resolution() {
    let transport = Arc::new(MockTransport::new());
    let providers = [MockProvider::new("a", Behaviour::RateLimited), MockProvider::new("b", Behaviour::Unavailable)];
    let pipeline = pipeline(&providers, transport.clone(), &["a", "b"]);

    let resolution = pipeline.resolve(&SearchRequest::new("renewable energy 2024", 3)).await.unwrap();

    assert!(resolution.documents.is_empty());
    assert!(resolution.is_degraded());
    assert!(!resolution.summary.deadline_exceeded);
    assert_eq!(resolution.summary.providers_attempted, ids(&["a", "b"]));
    assert_eq!(transport.page_calls(), 0);
}

#[tokio::test]
async fn test_purge_reports_nothing_when_fresh() {
    let transport = Arc::new(MockTransport::new().page("https://a.example/1", article("One", "Renewable energy.")));
    let provider = MockProvider::new("a", Behaviour::Results(vec![result("a", "https://a.example/1", 1)]));
    let pipeline = pipeline(&[provider], transport, &["a"]);

    pipeline.resolve(&SearchRequest::new("renewable energy", 3)).await.unwrap();
    let report = pipeline.purge_expired().await.unwrap();

    assert_eq!(report.search_entries, 0);
    assert_eq!(report.durable_rows, 0);
}
