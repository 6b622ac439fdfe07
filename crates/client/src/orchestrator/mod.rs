//! Priority-ordered provider fallback.
//!
//! Providers are tried strictly one at a time in the caller's order. The
//! first non-empty result set wins and is cached under the key of the
//! chain head, so a repeat of the same request is served without touching
//! the network or the rate limiter. Everything runs under one request
//! deadline: backoff waits, provider calls and the durable tier lookup.

pub mod fallback;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sift_core::cache::ttl_for_recency;
use sift_core::time::{instant_after, whole_seconds};
use sift_core::{Acquire, CacheDb, CacheKey, FailureSummary, ProviderError, ProviderId, ProviderResult};
use sift_core::{RateLimiter, SearchCache, SearchRequest};
use tokio::time::{Instant, sleep_until, timeout_at};

pub use fallback::{DeniedAction, FallbackState, MAX_BACKOFF_ROUNDS, Resolved, on_denied};

use crate::providers::SearchProvider;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Mutable bookkeeping for one resolve call.
struct Run<'a> {
    request: &'a SearchRequest,
    order: &'a [ProviderId],
    key: CacheKey,
    deadline: Instant,
    /// Index of the provider currently being tried.
    position: usize,
    /// Backoff waits spent on the current provider.
    rounds: u32,
    outcome: Resolved,
}

impl Run<'_> {
    fn current(&self) -> FallbackState {
        match self.order.get(self.position) {
            Some(id) => FallbackState::Awaiting(id.clone()),
            None => FallbackState::Exhausted,
        }
    }

    fn advance(&mut self) -> FallbackState {
        self.position += 1;
        self.rounds = 0;
        self.current()
    }
}

/// Runs the fallback state machine over registered providers.
pub struct Orchestrator {
    providers: HashMap<ProviderId, Arc<dyn SearchProvider>>,
    limiter: Arc<RateLimiter>,
    cache: Arc<SearchCache>,
    durable: Option<CacheDb>,
    default_ttl: Duration,
    max_backoff: Duration,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(limiter: Arc<RateLimiter>, cache: Arc<SearchCache>) -> Self {
        Self {
            providers: HashMap::new(),
            limiter,
            cache,
            durable: None,
            default_ttl: DEFAULT_TTL,
            max_backoff: DEFAULT_MAX_BACKOFF,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Register an adapter under its own id, replacing any previous one.
    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.providers.insert(provider.id().clone(), provider);
        self
    }

    pub fn with_durable(mut self, db: CacheDb) -> Self {
        self.durable = Some(db);
        self
    }

    /// TTL for requests without a recency window.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Request deadline used by [`Orchestrator::resolve`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn cache(&self) -> &Arc<SearchCache> {
        &self.cache
    }

    pub fn durable(&self) -> Option<&CacheDb> {
        self.durable.as_ref()
    }

    /// Resolve with the configured request deadline.
    pub async fn resolve(&self, request: &SearchRequest, order: &[ProviderId]) -> Resolved {
        self.resolve_until(request, order, instant_after(Instant::now(), self.deadline)).await
    }

    /// Resolve, giving up at `deadline`.
    pub async fn resolve_until(&self, request: &SearchRequest, order: &[ProviderId], deadline: Instant) -> Resolved {
        let mut run = Run {
            request,
            order,
            key: CacheKey::new(request, order),
            deadline,
            position: 0,
            rounds: 0,
            outcome: Resolved::default(),
        };

        let mut state = FallbackState::Idle;
        while !state.is_terminal() {
            state = self.step(&mut run, state).await;
        }

        let Run { key, outcome, .. } = run;
        if outcome.results.is_empty() {
            tracing::warn!(
                query = %key.normalized_query,
                attempted = outcome.summary.providers_attempted.len(),
                rate_limited = outcome.summary.providers_rate_limited.len(),
                deadline_exceeded = outcome.summary.deadline_exceeded,
                "all providers exhausted"
            );
        }
        outcome
    }

    async fn step(&self, run: &mut Run<'_>, state: FallbackState) -> FallbackState {
        match state {
            FallbackState::Idle => match self.lookup(&run.key, run.deadline).await {
                Some(hit) => {
                    tracing::debug!(query = %run.key.normalized_query, head = %run.key.provider_id, "search cache hit");
                    run.outcome.summary.cache_hit = true;
                    run.outcome.results = hit;
                    FallbackState::Resolved
                }
                None => run.current(),
            },
            FallbackState::Awaiting(id) => self.attempt(run, id).await,
            FallbackState::Backoff(id, until) => {
                tracing::debug!(provider = %id, "backing off");
                sleep_until(until).await;
                FallbackState::Awaiting(id)
            }
            terminal @ (FallbackState::Exhausted | FallbackState::Resolved) => terminal,
        }
    }

    async fn attempt(&self, run: &mut Run<'_>, id: ProviderId) -> FallbackState {
        if Instant::now() >= run.deadline {
            run.outcome.summary.deadline_exceeded = true;
            return FallbackState::Exhausted;
        }

        let Some(provider) = self.providers.get(&id) else {
            tracing::warn!(provider = %id, "provider not configured");
            run.outcome.summary.record_failure(&id, "not configured");
            return run.advance();
        };

        if let Acquire::Denied { retry_after } = self.limiter.acquire(&id) {
            return match on_denied(Instant::now(), retry_after, self.max_backoff, run.deadline, run.rounds) {
                DeniedAction::Wait(until) => {
                    run.rounds += 1;
                    FallbackState::Backoff(id, until)
                }
                DeniedAction::Skip => {
                    tracing::debug!(provider = %id, ?retry_after, "rate limited locally, skipping");
                    run.outcome.summary.record_rate_limited(&id);
                    run.advance()
                }
            };
        }

        run.outcome.summary.providers_attempted.push(id.clone());
        match timeout_at(run.deadline, provider.query(run.request)).await {
            Err(_) => {
                tracing::warn!(provider = %id, "provider call cut off by deadline");
                run.outcome.summary.deadline_exceeded = true;
                run.outcome.summary.record_failure(&id, "deadline exceeded");
                FallbackState::Exhausted
            }
            Ok(Ok(found)) if !found.is_empty() => {
                tracing::debug!(provider = %id, count = found.len(), "provider resolved");
                self.store(&run.key, &found, run.request).await;
                run.outcome.results = found;
                run.outcome.served_by = Some(id);
                FallbackState::Resolved
            }
            Ok(outcome) => {
                let err = outcome.err().unwrap_or(ProviderError::Empty);
                Self::record_outcome(&mut run.outcome.summary, &id, err);
                run.advance()
            }
        }
    }

    fn record_outcome(summary: &mut FailureSummary, id: &ProviderId, err: ProviderError) {
        match err {
            ProviderError::RateLimited { retry_after } => {
                tracing::debug!(provider = %id, ?retry_after, "provider rate limited");
                summary.record_rate_limited(id);
            }
            other => {
                tracing::warn!(provider = %id, error = %other, "provider failed");
                summary.record_failure(id, other.to_string());
            }
        }
    }

    /// Memory tier first, then the durable tier, warming memory on a hit.
    async fn lookup(&self, key: &CacheKey, deadline: Instant) -> Option<Vec<ProviderResult>> {
        if let Some(entry) = self.cache.get(key) {
            return Some(entry.value);
        }

        let db = self.durable.as_ref()?;
        match timeout_at(deadline, db.get_search(key)).await {
            Ok(Ok(Some(stored))) => {
                let ttl = stored.remaining_ttl();
                if ttl.is_zero() {
                    return None;
                }
                self.cache.put(key.clone(), stored.results.clone(), ttl);
                Some(stored.results)
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "durable cache read failed");
                None
            }
            Err(_) => None,
        }
    }

    async fn store(&self, key: &CacheKey, results: &[ProviderResult], request: &SearchRequest) {
        let ttl = ttl_for_recency(request.recency_window, self.default_ttl);
        self.cache.put(key.clone(), results.to_vec(), ttl);

        if let Some(db) = &self.durable
            && let Err(e) = db.put_search(key, results, whole_seconds(ttl)).await
        {
            tracing::warn!(error = %e, "durable cache write failed");
        }
    }
}
