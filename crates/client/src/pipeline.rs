//! End-to-end retrieval: fallback search, gated fetch fan-out, ranking.
//!
//! [`Pipeline::resolve`] is the only entry point the report layer needs.
//! Provider and fetch failures never surface as errors; they are counted
//! in the [`FailureSummary`] returned with the documents.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sift_core::{AppConfig, CacheDb, ConfigError, Document, DocumentCache, Error, FailureSummary, FetchError};
use sift_core::time::instant_after;
use sift_core::{ProviderId, ProviderResult, RateLimiter, SearchCache, SearchRequest};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};

use crate::fetch::{FetchConfig, FetchTransport, HttpTransport};
use crate::orchestrator::Orchestrator;
use crate::policy::{PolicyConfig, PolicyGate};
use crate::providers::{
    BraveClient, BraveConfig, DuckDuckGoConfig, DuckDuckGoProvider, SearchProvider, SerperConfig, SerperProvider,
};
use crate::rank;
use crate::retriever::ContentRetriever;
use crate::scoring::{KeywordScorer, RelevanceScorer};

const DEFAULT_FAN_OUT: usize = 4;
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024;

/// Ranked documents plus the diagnostics for how they were obtained.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub documents: Vec<Document>,
    pub summary: FailureSummary,
}

impl Resolution {
    /// True when nothing usable came back or the deadline cut the run short.
    pub fn is_degraded(&self) -> bool {
        self.documents.is_empty() || self.summary.deadline_exceeded
    }
}

/// Counts of cache entries removed by [`Pipeline::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub search_entries: usize,
    pub document_entries: usize,
    pub policy_records: usize,
    pub durable_rows: u64,
}

pub struct Pipeline {
    orchestrator: Orchestrator,
    retriever: Arc<ContentRetriever>,
    gate: Arc<PolicyGate>,
    documents: Option<Arc<DocumentCache>>,
    scorer: Arc<dyn RelevanceScorer>,
    order: Vec<ProviderId>,
    fan_out: usize,
    fetch_timeout: Duration,
    max_bytes: usize,
}

impl Pipeline {
    /// `order` is the provider fallback order, highest priority first.
    pub fn new(
        orchestrator: Orchestrator,
        retriever: Arc<ContentRetriever>,
        gate: Arc<PolicyGate>,
        order: Vec<ProviderId>,
    ) -> Self {
        Self {
            orchestrator,
            retriever,
            gate,
            documents: None,
            scorer: Arc::new(KeywordScorer),
            order,
            fan_out: DEFAULT_FAN_OUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Maximum concurrent document fetches.
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    pub fn with_fetch_limits(mut self, timeout: Duration, max_bytes: usize) -> Self {
        self.fetch_timeout = timeout;
        self.max_bytes = max_bytes;
        self
    }

    /// Document cache the retriever writes to, so it can be purged here.
    pub fn with_document_cache(mut self, cache: Arc<DocumentCache>) -> Self {
        self.documents = Some(cache);
        self
    }

    pub fn order(&self) -> &[ProviderId] {
        &self.order
    }

    /// Build the full stack from configuration.
    ///
    /// Providers listed in `provider_order` without credentials are skipped
    /// with a warning. The durable tier is opened only when `persist_cache`
    /// is set; failing to open it is logged and the pipeline runs memory-only.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP transport cannot be built or no
    /// provider in `provider_order` could be configured.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let transport: Arc<dyn FetchTransport> = Arc::new(
            HttpTransport::new(FetchConfig {
                user_agent: config.user_agent.clone(),
                timeout: config.timeout(),
                block_private_addresses: config.block_private_addresses,
            })
            .map_err(|e| ConfigError::Invalid { field: "user_agent".into(), reason: e.to_string() })?,
        );

        let gate = Arc::new(PolicyGate::new(
            transport.clone(),
            PolicyConfig {
                ttl: config.policy_ttl(),
                retries: config.policy_retries,
                fetch_timeout: config.timeout(),
                fail_open: config.policy_fail_open,
                respect_robots: config.respect_robots,
                allowlist_domains: config.allowlist_domains.clone(),
                denylist_domains: config.denylist_domains.clone(),
                ..Default::default()
            },
        ));

        let documents = Arc::new(DocumentCache::new(config.cache_max_entries));
        let retriever = Arc::new(
            ContentRetriever::new(transport, gate.clone(), config.user_agent.clone())
                .with_document_cache(documents.clone(), config.document_ttl()),
        );

        let limiter = Arc::new(RateLimiter::from_config(config.rate_limit, &config.provider_rate_limits));
        let mut orchestrator = Orchestrator::new(limiter, Arc::new(SearchCache::new(config.cache_max_entries)))
            .with_default_ttl(config.cache_default_ttl())
            .with_max_backoff(config.max_backoff())
            .with_deadline(config.request_deadline());

        let mut order = Vec::new();
        for id in config.provider_ids() {
            match build_provider(&id, config) {
                Some(provider) => {
                    orchestrator = orchestrator.with_provider(provider);
                    order.push(id);
                }
                None => tracing::warn!(provider = %id, "provider skipped: not configured"),
            }
        }
        if order.is_empty() {
            return Err(ConfigError::Missing {
                field: "provider_order".into(),
                hint: "set brave_api_key or serper_api_key, or include duckduckgo".into(),
            }
            .into());
        }

        if config.persist_cache {
            match CacheDb::open(&config.db_path).await {
                Ok(db) => orchestrator = orchestrator.with_durable(db),
                Err(e) => tracing::warn!(error = %e, path = %config.db_path.display(), "durable cache unavailable"),
            }
        }

        tracing::info!(providers = ?order, fan_out = config.fan_out, "pipeline ready");

        Ok(Self::new(orchestrator, retriever, gate, order)
            .with_document_cache(documents)
            .with_fan_out(config.fan_out)
            .with_fetch_limits(config.timeout(), config.max_bytes))
    }

    /// Run one research query end to end.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the request fails validation. Every
    /// other failure is reported through the summary.
    pub async fn resolve(&self, request: &SearchRequest) -> Result<Resolution, Error> {
        request.validate()?;

        let deadline = instant_after(Instant::now(), self.orchestrator.deadline());
        let resolved = self.orchestrator.resolve_until(request, &self.order, deadline).await;
        let mut summary = resolved.summary;

        let mut seen = HashSet::new();
        let targets: Vec<ProviderResult> =
            resolved.results.into_iter().filter(|r| seen.insert(r.url.clone())).collect();

        let documents = self.fetch_all(request, targets, deadline, &mut summary).await;
        let documents = rank::merge(vec![documents], request.max_results);
        summary.total_documents = documents.len();

        tracing::info!(
            query = %request.normalized_query(),
            documents = documents.len(),
            cache_hit = summary.cache_hit,
            fetch_failures = summary.fetch_failures,
            denied = summary.providers_denied_by_policy.len(),
            deadline_exceeded = summary.deadline_exceeded,
            "resolve completed"
        );

        Ok(Resolution { documents, summary })
    }

    async fn fetch_all(
        &self,
        request: &SearchRequest,
        targets: Vec<ProviderResult>,
        deadline: Instant,
        summary: &mut FailureSummary,
    ) -> Vec<Document> {
        let semaphore = Arc::new(Semaphore::new(self.fan_out));
        let mut tasks = JoinSet::new();

        for (priority, result) in targets.into_iter().enumerate() {
            let retriever = self.retriever.clone();
            let semaphore = semaphore.clone();
            let (timeout, max_bytes) = (self.fetch_timeout, self.max_bytes);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = retriever.fetch(&result.url, timeout, max_bytes).await;
                (priority, result, outcome)
            });
        }

        let mut documents = Vec::new();
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Err(_) => {
                    tracing::warn!(pending = tasks.len(), "deadline reached, aborting fetches");
                    summary.deadline_exceeded = true;
                    tasks.abort_all();
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "fetch task failed");
                    summary.fetch_failures += 1;
                }
                Ok(Some(Ok((priority, result, outcome)))) => match outcome {
                    Ok(doc) => {
                        let relevance_score = self.scorer.score(&request.query, &doc.raw_text).clamp(0.0, 1.0);
                        documents.push(Document { relevance_score, ..doc }.with_provenance(&result, priority));
                    }
                    Err(FetchError::Forbidden(reason)) => {
                        tracing::debug!(url = %result.url, %reason, "fetch denied");
                        summary.providers_denied_by_policy.push(result.url);
                    }
                    Err(e) => {
                        tracing::debug!(url = %result.url, error = %e, "fetch failed");
                        summary.fetch_failures += 1;
                    }
                },
            }
        }
        documents
    }

    /// Drop expired entries from every cache tier.
    pub async fn purge_expired(&self) -> Result<PurgeReport, Error> {
        let mut report = PurgeReport {
            search_entries: self.orchestrator.cache().evict_expired(),
            document_entries: self.documents.as_ref().map_or(0, |cache| cache.evict_expired()),
            policy_records: self.gate.evict_expired(),
            durable_rows: 0,
        };
        if let Some(db) = self.orchestrator.durable() {
            report.durable_rows = db.purge_expired_search().await?;
        }
        tracing::info!(?report, "caches purged");
        Ok(report)
    }
}

fn build_provider(id: &ProviderId, config: &AppConfig) -> Option<Arc<dyn SearchProvider>> {
    let key = |k: &Option<String>| k.as_deref().map(str::trim).filter(|k| !k.is_empty()).map(str::to_string);
    let (timeout, user_agent) = (config.timeout(), config.user_agent.clone());

    let built: Result<Arc<dyn SearchProvider>, String> = match id.as_str() {
        "brave" => {
            let api_key = key(&config.brave_api_key)?;
            BraveClient::new(BraveConfig { api_key, timeout, user_agent, ..Default::default() })
                .map(|p| Arc::new(p) as Arc<dyn SearchProvider>)
                .map_err(|e| e.to_string())
        }
        "serper" => {
            let api_key = key(&config.serper_api_key)?;
            SerperProvider::new(SerperConfig { api_key, timeout, user_agent, ..Default::default() })
                .map(|p| Arc::new(p) as Arc<dyn SearchProvider>)
                .map_err(|e| e.to_string())
        }
        "duckduckgo" => DuckDuckGoProvider::new(DuckDuckGoConfig { timeout, user_agent, ..Default::default() })
            .map(|p| Arc::new(p) as Arc<dyn SearchProvider>)
            .map_err(|e| e.to_string()),
        other => Err(format!("unknown provider {other}")),
    };

    built.map_err(|reason| tracing::warn!(provider = %id, %reason, "provider could not be built")).ok()
}
