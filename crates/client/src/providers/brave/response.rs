//! Brave Search API response types and normalization.

use serde::Deserialize;
use sift_core::{ProviderId, ProviderResult};

use crate::dates::parse_date;
use crate::fetch::result_url;

/// Raw response from Brave Web Search API.
#[derive(Debug, Deserialize)]
pub struct BraveApiResponse {
    pub query: QueryInfo,
    #[serde(default)]
    pub web: Option<ResultBlock>,
    #[serde(default)]
    pub news: Option<ResultBlock>,
}

/// Query metadata from Brave response.
#[derive(Debug, Deserialize)]
pub struct QueryInfo {
    pub original: String,
    #[serde(default)]
    #[serde(alias = "moreResultsAvailable")]
    pub more_results_available: bool,
}

/// Web or news results container.
#[derive(Debug, Deserialize)]
pub struct ResultBlock {
    pub results: Vec<BraveResult>,
}

/// Individual search result from Brave.
#[derive(Debug, Deserialize)]
pub struct BraveResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    /// Machine-readable publication time, e.g. `2024-05-01T08:00:00`.
    #[serde(default)]
    pub page_age: Option<String>,
    /// Human-readable age, e.g. `3 days ago`.
    #[serde(default)]
    pub age: Option<String>,
}

impl BraveApiResponse {
    /// Web results followed by news results, normalized.
    ///
    /// Results whose URL is not a usable http(s) address are dropped.
    pub fn into_results(self, provider_id: &ProviderId) -> Vec<ProviderResult> {
        self.web
            .into_iter()
            .chain(self.news)
            .flat_map(|block| block.results)
            .filter_map(|r| {
                let url = result_url(&r.url)?;
                let published_at = r.page_age.as_deref().or(r.age.as_deref()).and_then(parse_date);
                Some(ProviderResult {
                    provider_id: provider_id.clone(),
                    url,
                    title: r.title.trim().to_string(),
                    snippet: r.description.trim().to_string(),
                    published_at,
                    rank_hint: 0,
                })
            })
            .enumerate()
            .map(|(idx, result)| ProviderResult { rank_hint: idx + 1, ..result })
            .collect()
    }

    pub fn has_more(&self) -> bool {
        self.query.more_results_available
    }
}
