//! Search provider adapters.
//!
//! Each adapter turns a [`SearchRequest`] into normalized
//! [`ProviderResult`]s for one backend. Adapters never retry or sleep;
//! fallback, backoff and caching belong to the orchestrator. Every failure
//! is reported as a [`ProviderError`] variant:
//!
//! | Condition                          | Variant           |
//! |------------------------------------|-------------------|
//! | HTTP 429, bot challenge            | `RateLimited`     |
//! | network, timeout, auth, 5xx        | `Unavailable`     |
//! | undecodable body                   | `InvalidResponse` |
//! | zero results                       | `Empty`           |

pub mod brave;
pub mod duckduckgo;
pub mod serper;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use sift_core::{ProviderError, ProviderId, ProviderResult, SearchRequest};

pub use brave::{BraveClient, BraveConfig};
pub use duckduckgo::{DuckDuckGoConfig, DuckDuckGoProvider};
pub use serper::{SerperConfig, SerperProvider};

/// A search backend reachable over the network.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn id(&self) -> &ProviderId;

    async fn query(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError>;
}

/// Coarse freshness bucket derived from a recency window.
///
/// Every backend only supports day/week/month/year filters, so windows
/// are rounded up to the next bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Day,
    Week,
    Month,
    Year,
}

impl Freshness {
    pub fn from_window(window: Option<Duration>) -> Option<Self> {
        const DAY: u64 = 24 * 60 * 60;
        let secs = window?.as_secs();
        Some(match secs {
            s if s <= DAY => Self::Day,
            s if s <= 7 * DAY => Self::Week,
            s if s <= 31 * DAY => Self::Month,
            _ => Self::Year,
        })
    }

    /// Single-letter code shared by Google `qdr:` and DuckDuckGo `df`.
    pub fn letter(self) -> &'static str {
        match self {
            Self::Day => "d",
            Self::Week => "w",
            Self::Month => "m",
            Self::Year => "y",
        }
    }
}

/// Build the HTTP client used by API adapters.
pub(crate) fn build_http(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .use_rustls_tls()
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {e}")))
}

/// Wait hint from `X-RateLimit-Reset` (first value) or `Retry-After` seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    seconds("x-ratelimit-reset")
        .or_else(|| seconds(RETRY_AFTER.as_str()))
        .map(Duration::from_secs)
}

pub(crate) fn send_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Unavailable("request timed out".into())
    } else {
        ProviderError::Unavailable(format!("network error: {err}"))
    }
}

/// Map a non-success status to a provider error.
pub(crate) fn status_error(status: StatusCode, headers: &HeaderMap) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after: retry_after(headers) },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Unavailable("authentication failed".into())
        }
        other => ProviderError::Unavailable(format!("http status {}", other.as_u16())),
    }
}

/// Cap the result list, renumber ranks from 1 and map an empty list to `Empty`.
pub(crate) fn finish(results: Vec<ProviderResult>, max: usize) -> Result<Vec<ProviderResult>, ProviderError> {
    let results: Vec<ProviderResult> = results
        .into_iter()
        .take(max)
        .enumerate()
        .map(|(idx, result)| ProviderResult { rank_hint: idx + 1, ..result })
        .collect();
    if results.is_empty() { Err(ProviderError::Empty) } else { Ok(results) }
}
