//! Request, result and document types shared across the retrieval core.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Maximum query length accepted by [`SearchRequest::validate`].
const MAX_QUERY_CHARS: usize = 400;

/// Stable identifier of a provider adapter (e.g. `brave`, `serper`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Coarse category of the information being researched.
///
/// Produced by the external query analysis step; providers may use it to
/// pick a vertical (e.g. news search) when they support one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DomainHint {
    News,
    Academic,
    Technical,
    General,
}

impl DomainHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Academic => "academic",
            Self::Technical => "technical",
            Self::General => "general",
        }
    }
}

/// A single research query as issued by the analysis layer.
///
/// Passed by shared reference through the pipeline and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Upper bound on ranked documents returned.
    pub max_results: usize,
    /// How recent results must be; `None` means no preference.
    pub recency_window: Option<Duration>,
    /// Optional category hint.
    pub domain_hint: Option<DomainHint>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self { query: query.into(), max_results, recency_window: None, domain_hint: None }
    }

    pub fn with_recency_window(mut self, window: Duration) -> Self {
        self.recency_window = Some(window);
        self
    }

    pub fn with_domain_hint(mut self, hint: DomainHint) -> Self {
        self.domain_hint = Some(hint);
        self
    }

    /// Lowercased query with runs of whitespace collapsed to one space.
    pub fn normalized_query(&self) -> String {
        self.query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Validate the request before it reaches any provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the query is blank or longer than
    /// 400 characters, or if `max_results` is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidInput("query cannot be empty".into()));
        }
        if self.query.chars().count() > MAX_QUERY_CHARS {
            return Err(Error::InvalidInput(format!("query too long (max {MAX_QUERY_CHARS} chars)")));
        }
        if self.max_results == 0 {
            return Err(Error::InvalidInput("max_results must be at least 1".into()));
        }
        Ok(())
    }
}

/// A search hit normalized by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider_id: ProviderId,
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub published_at: Option<DateTime<Utc>>,
    /// 1-indexed position in the provider's own ranking.
    pub rank_hint: usize,
}

/// Extracted page content ready for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source_url: String,
    pub provider_id: ProviderId,
    pub title: Option<String>,
    /// Markup-free text. Never empty.
    pub raw_text: String,
    pub extracted_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    /// Relevance in `[0, 1]`.
    pub relevance_score: f64,
    /// Fingerprint of the normalized text.
    pub content_hash: String,
    /// Position in the priority-ordered result sequence; lower wins.
    pub priority: usize,
}

impl Document {
    /// Attach search provenance to a fetched document.
    ///
    /// The provider's title and publication date only fill gaps left by
    /// extraction.
    pub fn with_provenance(mut self, result: &ProviderResult, priority: usize) -> Self {
        self.provider_id = result.provider_id.clone();
        self.priority = priority;
        if self.published_at.is_none() {
            self.published_at = result.published_at;
        }
        if self.title.as_deref().is_none_or(str::is_empty) && !result.title.is_empty() {
            self.title = Some(result.title.clone());
        }
        self
    }
}

/// A provider that was called and failed with something other than a rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider_id: ProviderId,
    pub reason: String,
}

/// Diagnostics for a single resolve call.
///
/// Always returned alongside results so an empty list is never silent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Providers whose adapter was actually invoked, in order.
    pub providers_attempted: Vec<ProviderId>,
    /// Providers skipped or refused because of rate limits.
    pub providers_rate_limited: Vec<ProviderId>,
    /// Providers that were invoked and failed or returned nothing.
    pub providers_failed: Vec<ProviderFailure>,
    /// Source URLs refused by the policy gate.
    pub providers_denied_by_policy: Vec<String>,
    /// Source URLs that failed to fetch or extract for other reasons.
    pub fetch_failures: usize,
    pub total_documents: usize,
    /// Whether the result set came from the cache store.
    pub cache_hit: bool,
    /// Whether the request deadline cut the run short.
    pub deadline_exceeded: bool,
}

impl FailureSummary {
    pub fn record_rate_limited(&mut self, provider: &ProviderId) {
        if !self.providers_rate_limited.contains(provider) {
            self.providers_rate_limited.push(provider.clone());
        }
    }

    pub fn record_failure(&mut self, provider: &ProviderId, reason: impl Into<String>) {
        self.providers_failed.push(ProviderFailure { provider_id: provider.clone(), reason: reason.into() });
    }
}
