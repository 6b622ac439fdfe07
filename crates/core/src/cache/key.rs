//! Search cache keys and recency-derived TTLs.

use std::time::Duration;

use super::hash::digest_fields;
use crate::types::{ProviderId, SearchRequest};

const DAY: Duration = Duration::from_secs(86_400);
const HOUR: Duration = Duration::from_secs(3_600);

/// Identity of a cached result set.
///
/// Built for the head of the fallback chain: whichever provider ends up
/// serving, the same request with the same chain maps to the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider_id: ProviderId,
    pub normalized_query: String,
    /// Digest of every other parameter that changes the result set.
    pub params_hash: String,
}

impl CacheKey {
    pub fn new(request: &SearchRequest, chain: &[ProviderId]) -> Self {
        let provider_id = chain.first().cloned().unwrap_or_else(|| ProviderId::new(""));
        let max_results = request.max_results.to_string();
        let recency = request.recency_window.map(|w| w.as_secs().to_string()).unwrap_or_default();
        let hint = request.domain_hint.map(|h| h.as_str()).unwrap_or_default();
        let chain_ids = chain.iter().map(ProviderId::as_str).collect::<Vec<_>>().join(",");

        let params_hash = digest_fields([max_results.as_str(), recency.as_str(), hint, chain_ids.as_str()]);

        Self { provider_id, normalized_query: request.normalized_query(), params_hash }
    }

    /// Stable key for the durable tier.
    pub fn digest(&self) -> String {
        digest_fields([self.provider_id.as_str(), self.normalized_query.as_str(), self.params_hash.as_str()])
    }
}

/// TTL for a result set given how recent the results must be.
///
/// Narrow recency windows go stale faster. Requests without a window
/// use `default_ttl`.
pub fn ttl_for_recency(recency_window: Option<Duration>, default_ttl: Duration) -> Duration {
    match recency_window {
        None => default_ttl,
        Some(w) if w <= DAY => HOUR,
        Some(w) if w <= 7 * DAY => 6 * HOUR,
        Some(w) if w <= 31 * DAY => 12 * HOUR,
        Some(_) => 24 * HOUR,
    }
}
