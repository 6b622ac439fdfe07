//! Brave Search API adapter.
//!
//! ### API
//!
//! - **Endpoint**: `https://api.search.brave.com/res/v1/web/search`
//! - **Authentication**: Uses `X-Subscription-Token` header.
//! - **Rate Limiting**: none here. HTTP 429 surfaces as
//!   `ProviderError::RateLimited` with the reset hint from
//!   `X-RateLimit-Reset`; spacing is the shared limiter's job.
//! - **Freshness**: the recency window maps to `pd`/`pw`/`pm`/`py`.
//! - **Normalization**: web and news results become `ProviderResult`s with
//!   `page_age` parsed as the publication date.

pub mod error;
pub mod request;
pub mod response;

pub use error::BraveError;
pub use request::{BraveQuery, SafeSearch};
pub use response::BraveApiResponse;

use async_trait::async_trait;
use reqwest::header;
use sift_core::{ProviderError, ProviderId, ProviderResult, SearchRequest};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{SearchProvider, finish, retry_after};

/// Default base URL for Brave Search API.
const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "sift/0.1";

/// Brave API client configuration.
#[derive(Clone)]
pub struct BraveConfig {
    pub api_key: String,
    /// Base URL (default: https://api.search.brave.com/res/v1).
    pub base_url: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for BraveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl fmt::Debug for BraveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BraveConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Brave Search API client.
#[derive(Debug, Clone)]
pub struct BraveClient {
    id: ProviderId,
    http: reqwest::Client,
    config: BraveConfig,
}

impl BraveClient {
    /// Create a new Brave client with the given configuration.
    pub fn new(config: BraveConfig) -> Result<Self, BraveError> {
        if config.api_key.trim().is_empty() {
            return Err(BraveError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .build()
            .map_err(|e| BraveError::Network(Arc::new(e)))?;

        Ok(Self { id: ProviderId::new("brave"), http, config })
    }

    /// Execute a web search query.
    pub async fn search(&self, query: &BraveQuery) -> Result<BraveApiResponse, BraveError> {
        query.validate()?;

        let start = Instant::now();
        let url = format!("{}/web/search", self.config.base_url.trim_end_matches('/'));

        tracing::debug!(
            count = query.get_count(),
            freshness = ?query.freshness,
            safesearch = ?query.get_safesearch(),
            "searching Brave API"
        );

        let http_response = self
            .http
            .get(&url)
            .header("X-Subscription-Token", &self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, &self.config.user_agent)
            .query(query)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!(status = status.as_u16(), "Brave API response");

        if status == 401 || status == 403 {
            return Err(BraveError::AuthError);
        }

        if status == 429 {
            return Err(BraveError::RateLimited { retry_after: retry_after(http_response.headers()) });
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(BraveError::HttpError { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let api_response: BraveApiResponse =
            serde_json::from_slice(&bytes).map_err(|e| BraveError::Parse(e.to_string()))?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            web = api_response.web.as_ref().map(|w| w.results.len()).unwrap_or(0),
            more = api_response.has_more(),
            "Brave search completed"
        );

        Ok(api_response)
    }
}

#[async_trait]
impl SearchProvider for BraveClient {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn query(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError> {
        let query = BraveQuery::from(request);
        let response = self.search(&query).await?;
        finish(response.into_results(&self.id), request.max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new_missing_key() {
        let result = BraveClient::new(BraveConfig::default());
        assert!(matches!(result, Err(BraveError::MissingApiKey)));

        let blank = BraveConfig { api_key: "   ".into(), ..Default::default() };
        assert!(matches!(BraveClient::new(blank), Err(BraveError::MissingApiKey)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = BraveConfig { api_key: "secret-token".into(), ..Default::default() };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));

        let client = BraveClient::new(config).unwrap();
        assert_eq!(client.id().as_str(), "brave");
    }

    #[tokio::test]
    async fn test_invalid_query_rejected_before_network() {
        let config = BraveConfig {
            api_key: "key".into(),
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let client = BraveClient::new(config).unwrap();
        let request = SearchRequest::new("word ".repeat(60), 5);
        let err = client.query(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(msg) if msg.contains("invalid query")));
    }
}
