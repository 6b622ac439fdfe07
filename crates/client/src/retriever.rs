//! Policy-gated page retrieval and extraction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sift_core::cache::content_fingerprint;
use sift_core::{Document, DocumentCache, FetchError, ProviderId};
use url::Url;

use crate::extract::{Extractor, HtmlExtractor};
use crate::fetch::{FetchTransport, MAX_REDIRECTS, RawResponse, canonicalize};
use crate::policy::PolicyGate;

/// Provider id carried by documents fetched outside a search run.
const DIRECT: &str = "direct";

/// Fetches source URLs and turns them into [`Document`]s.
///
/// The policy gate is consulted before anything else; a denied URL never
/// reaches the transport, even when an earlier copy is cached. Redirects are
/// followed here, one hop at a time, and every target passes the gate too.
pub struct ContentRetriever {
    transport: Arc<dyn FetchTransport>,
    gate: Arc<PolicyGate>,
    extractor: Arc<dyn Extractor>,
    user_agent: String,
    documents: Option<(Arc<DocumentCache>, Duration)>,
    max_redirects: usize,
}

impl ContentRetriever {
    pub fn new(transport: Arc<dyn FetchTransport>, gate: Arc<PolicyGate>, user_agent: impl Into<String>) -> Self {
        Self {
            transport,
            gate,
            extractor: Arc::new(HtmlExtractor),
            user_agent: user_agent.into(),
            documents: None,
            max_redirects: MAX_REDIRECTS,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Reuse extracted documents for `ttl` instead of refetching.
    pub fn with_document_cache(mut self, cache: Arc<DocumentCache>, ttl: Duration) -> Self {
        self.documents = Some((cache, ttl));
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetch `url` and extract its text.
    ///
    /// `timeout` bounds the whole transfer including the body; the byte
    /// budget is enforced by the transport while streaming. The returned
    /// document has a zero relevance score and `direct` provenance, and its
    /// `source_url` is where the last redirect hop landed.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` if the URL or a redirect target cannot be canonicalized
    /// - `Forbidden` if the policy gate denies the URL or any redirect target
    ///   (the denied URL is never requested)
    /// - `Timeout`, `TooLarge`, `ConnectionFailed` from the transfer, the
    ///   latter also for more than `max_redirects` hops
    /// - `HttpStatus` for non-2xx responses
    /// - `EmptyContent` when extraction yields no text
    pub async fn fetch(&self, url: &str, timeout: Duration, max_bytes: usize) -> Result<Document, FetchError> {
        let url = canonicalize(url)?;
        self.check_policy(&url).await?;

        let key = url.to_string();
        if let Some((cache, _)) = &self.documents
            && let Some(entry) = cache.get(&key)
        {
            if entry.value.source_url != key {
                self.check_policy(&canonicalize(&entry.value.source_url)?).await?;
            }
            tracing::debug!(url = %url, "document cache hit");
            return Ok(entry.value);
        }

        let document = self.fetch_uncached(&url, timeout, max_bytes).await?;

        if let Some((cache, ttl)) = &self.documents {
            cache.put(key, document.clone(), *ttl);
        }
        Ok(document)
    }

    async fn check_policy(&self, url: &Url) -> Result<(), FetchError> {
        if self.gate.is_allowed(url, &self.user_agent).await {
            Ok(())
        } else {
            Err(FetchError::Forbidden(format!("{url} disallowed by crawl policy")))
        }
    }

    /// Request `url`, taking redirect hops only to targets the gate allows.
    async fn follow(&self, url: &Url, max_bytes: usize) -> Result<RawResponse, FetchError> {
        let mut current = url.clone();
        let mut hops = 0;
        loop {
            let response = self.transport.get(&current, max_bytes).await?;
            let Some(target) = response.redirect_target() else {
                return Ok(response);
            };
            if hops == self.max_redirects {
                return Err(FetchError::ConnectionFailed(format!(
                    "{url}: more than {} redirects",
                    self.max_redirects
                )));
            }
            hops += 1;

            let target = canonicalize(target.as_str())?;
            self.check_policy(&target).await?;
            tracing::debug!(from = %current, to = %target, hop = hops, "following redirect");
            current = target;
        }
    }

    async fn fetch_uncached(&self, url: &Url, timeout: Duration, max_bytes: usize) -> Result<Document, FetchError> {
        let response = tokio::time::timeout(timeout, self.follow(url, max_bytes))
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;

        if !response.is_success() {
            return Err(FetchError::HttpStatus(response.status));
        }

        let body = String::from_utf8_lossy(&response.body);
        let extraction = self.extractor.extract(&body, response.content_type.as_deref());
        if extraction.text.is_empty() {
            return Err(FetchError::EmptyContent);
        }

        tracing::debug!(url = %url, chars = extraction.text.len(), fetch_ms = response.fetch_ms, "extracted");

        Ok(Document {
            source_url: response.url.to_string(),
            provider_id: ProviderId::new(DIRECT),
            title: extraction.title,
            content_hash: content_fingerprint(&extraction.text),
            raw_text: extraction.text,
            extracted_at: Utc::now(),
            published_at: extraction.published_at,
            relevance_score: 0.0,
            priority: 0,
        })
    }
}
