//! Serper (Google results) API adapter.
//!
//! `POST {base}/search` with an `X-API-KEY` header and a JSON body. The
//! `news` domain hint switches to `POST {base}/news`. Recency windows map
//! onto Google's `tbs=qdr:` filter.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sift_core::{DomainHint, ProviderError, ProviderId, ProviderResult, SearchRequest};

use super::{Freshness, SearchProvider, build_http, finish, send_error, status_error};
use crate::dates::parse_date;
use crate::fetch::result_url;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev";

/// Serper accepts at most 100 results per call.
const MAX_NUM: usize = 100;

#[derive(Clone)]
pub struct SerperConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for SerperConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "sift/0.1".to_string(),
        }
    }
}

impl fmt::Debug for SerperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerperConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SerperBody<'a> {
    q: &'a str,
    num: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    tbs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperItem>,
    #[serde(default)]
    news: Vec<SerperItem>,
}

#[derive(Debug, Deserialize)]
struct SerperItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug)]
pub struct SerperProvider {
    id: ProviderId,
    http: reqwest::Client,
    config: SerperConfig,
}

impl SerperProvider {
    pub fn new(config: SerperConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Unavailable("missing API key: serper_api_key not set".into()));
        }
        let http = build_http(config.timeout, &config.user_agent)?;
        Ok(Self { id: ProviderId::new("serper"), http, config })
    }

    fn normalize(&self, response: SerperResponse) -> Vec<ProviderResult> {
        response
            .organic
            .into_iter()
            .chain(response.news)
            .filter_map(|item| {
                Some(ProviderResult {
                    provider_id: self.id.clone(),
                    url: result_url(&item.link)?,
                    title: item.title.trim().to_string(),
                    snippet: item.snippet.trim().to_string(),
                    published_at: item.date.as_deref().and_then(parse_date),
                    rank_hint: 0,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for SerperProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn query(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError> {
        let endpoint = match request.domain_hint {
            Some(DomainHint::News) => "news",
            _ => "search",
        };
        let url = format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'));
        let body = SerperBody {
            q: request.query.trim(),
            num: request.max_results.clamp(1, MAX_NUM),
            tbs: Freshness::from_window(request.recency_window).map(|f| format!("qdr:{}", f.letter())),
        };

        tracing::debug!(endpoint, num = body.num, tbs = ?body.tbs, "searching Serper API");

        let response = self
            .http
            .post(&url)
            .header("X-API-KEY", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.headers()));
        }

        let bytes = response.bytes().await.map_err(|e| send_error(&e))?;
        let parsed: SerperResponse =
            serde_json::from_slice(&bytes).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        finish(self.normalize(parsed), request.max_results)
    }
}
