//! Shared fakes for the integration tests. No network access.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sift_client::fetch::{FetchTransport, RawResponse};
use sift_client::orchestrator::Orchestrator;
use sift_client::pipeline::Pipeline;
use sift_client::policy::{PolicyConfig, PolicyGate};
use sift_client::providers::SearchProvider;
use sift_client::retriever::ContentRetriever;
use sift_core::{FetchError, ProviderError, ProviderId, ProviderResult, RateLimitConfig, RateLimiter};
use sift_core::{DocumentCache, SearchCache, SearchRequest};
use url::Url;

/// What a [`MockProvider`] does when queried.
#[derive(Clone)]
pub enum Behaviour {
    Results(Vec<ProviderResult>),
    RateLimited,
    Unavailable,
    Empty,
    /// Never completes.
    Never,
}

pub struct MockProvider {
    id: ProviderId,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(id: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self { id: ProviderId::new(id), behaviour, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for MockProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn query(&self, _request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Results(results) => Ok(results.clone()),
            Behaviour::RateLimited => Err(ProviderError::RateLimited { retry_after: Some(Duration::from_secs(60)) }),
            Behaviour::Unavailable => Err(ProviderError::Unavailable("http status 503".into())),
            Behaviour::Empty => Err(ProviderError::Empty),
            Behaviour::Never => std::future::pending().await,
        }
    }
}

/// Serves canned pages by URL. robots.txt is 404 unless set per host.
#[derive(Default)]
pub struct MockTransport {
    pages: HashMap<String, (u16, String)>,
    robots: HashMap<String, String>,
    delay: Duration,
    page_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), (200, body.into()));
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), (status, String::new()));
        self
    }

    pub fn robots(mut self, host: &str, body: &str) -> Self {
        self.robots.insert(host.to_string(), body.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests for anything other than robots.txt.
    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchTransport for MockTransport {
    async fn get(&self, url: &Url, max_bytes: usize) -> Result<RawResponse, FetchError> {
        let (status, body) = if url.path() == "/robots.txt" {
            match url.host_str().and_then(|host| self.robots.get(host)) {
                Some(body) => (200, body.clone()),
                None => (404, String::new()),
            }
        } else {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.pages.get(url.as_str()).cloned().unwrap_or((404, String::new()))
        };

        if body.len() > max_bytes {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }
        let body = if (200..300).contains(&status) { Bytes::from(body) } else { Bytes::new() };
        Ok(RawResponse {
            url: url.clone(),
            status,
            location: None,
            content_type: Some("text/html; charset=utf-8".into()),
            body,
            fetch_ms: 0,
        })
    }
}

pub fn result(provider: &str, url: &str, rank: usize) -> ProviderResult {
    ProviderResult {
        provider_id: ProviderId::new(provider),
        url: url.to_string(),
        title: format!("result {rank}"),
        snippet: String::new(),
        published_at: None,
        rank_hint: rank,
    }
}

pub fn article(title: &str, text: &str) -> String {
    format!("<html><head><title>{title}</title></head><body><article><p>{text}</p></article></body></html>")
}

pub fn ids(ids: &[&str]) -> Vec<ProviderId> {
    ids.iter().map(|id| ProviderId::new(*id)).collect()
}

/// Limiter that never gets in the way.
pub fn open_limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimitConfig { max_per_window: 1_000, window_ms: 60_000, min_interval_ms: 0 }))
}

pub fn orchestrator(limiter: Arc<RateLimiter>, providers: &[Arc<MockProvider>]) -> Orchestrator {
    providers.iter().fold(Orchestrator::new(limiter, Arc::new(SearchCache::new(100))), |orchestrator, provider| {
        orchestrator.with_provider(provider.clone())
    })
}

/// Memory-only pipeline over mock providers, tried in `order`.
pub fn pipeline(providers: &[Arc<MockProvider>], transport: Arc<MockTransport>, order: &[&str]) -> Pipeline {
    let gate = Arc::new(PolicyGate::new(transport.clone(), PolicyConfig::default()));
    let documents = Arc::new(DocumentCache::new(100));
    let retriever = Arc::new(
        ContentRetriever::new(transport, gate.clone(), "sift-test/0.1")
            .with_document_cache(documents.clone(), Duration::from_secs(3600)),
    );
    Pipeline::new(orchestrator(open_limiter(), providers), retriever, gate, ids(order)).with_document_cache(documents)
}
