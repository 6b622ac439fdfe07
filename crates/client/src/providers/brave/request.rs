//! Brave Search API request types and validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sift_core::SearchRequest;

use super::BraveError;
use crate::providers::Freshness;

/// Query parameters for the Brave Web Search API.
///
/// Based on Brave Web Search API documentation:
/// https://api-dashboard.search.brave.com/app/documentation/web-search/get-started
#[derive(Debug, Clone, Serialize, Default)]
pub struct BraveQuery {
    /// Search query (required, max 400 chars / 50 words).
    pub q: String,

    /// Number of results (1-20, default 20).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u8>,

    /// Freshness filter: pd|pw|pm|py or YYYY-MM-DDtoYYYY-MM-DD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<String>,

    /// Safe search: off|moderate|strict (default moderate).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safesearch: Option<SafeSearch>,

    /// Restrict result types, e.g. `news,web`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_filter: Option<String>,
}

/// Safe search filtering levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Off,
    Moderate,
    Strict,
}

impl From<&SearchRequest> for BraveQuery {
    fn from(request: &SearchRequest) -> Self {
        let freshness = Freshness::from_window(request.recency_window).map(|f| format!("p{}", f.letter()));
        let result_filter = match request.domain_hint {
            Some(sift_core::DomainHint::News) => Some("news,web".to_string()),
            _ => None,
        };
        Self {
            q: request.query.trim().to_string(),
            count: Some(request.max_results.clamp(1, 20) as u8),
            freshness,
            safesearch: None,
            result_filter,
        }
    }
}

impl BraveQuery {
    /// Validate the query parameters.
    ///
    /// Returns an error if any parameters are out of range or malformed.
    pub fn validate(&self) -> Result<(), BraveError> {
        if self.q.is_empty() {
            return Err(BraveError::InvalidQuery("query cannot be empty".to_string()));
        }

        if self.q.len() > 400 {
            return Err(BraveError::InvalidQuery(format!("query too long: {} chars (max 400)", self.q.len())));
        }

        let word_count = self.q.split_whitespace().count();
        if word_count > 50 {
            return Err(BraveError::InvalidQuery(format!("query too long: {word_count} words (max 50)")));
        }

        if let Some(count) = self.count
            && !(1..=20).contains(&count)
        {
            return Err(BraveError::InvalidCount);
        }

        if let Some(freshness) = &self.freshness {
            Self::validate_freshness(freshness)?;
        }

        Ok(())
    }

    fn validate_freshness(freshness: &str) -> Result<(), BraveError> {
        const VALID_PRESETS: &[&str] = &["pd", "pw", "pm", "py"];

        if VALID_PRESETS.contains(&freshness) {
            return Ok(());
        }

        let range = freshness.split_once("to").and_then(|(from, to)| {
            let from = NaiveDate::parse_from_str(from, "%Y-%m-%d").ok()?;
            let to = NaiveDate::parse_from_str(to, "%Y-%m-%d").ok()?;
            Some((from, to))
        });
        match range {
            Some((from, to)) if from <= to => Ok(()),
            _ => Err(BraveError::InvalidFreshness(freshness.to_string())),
        }
    }

    /// Effective result count (default 20).
    pub fn get_count(&self) -> u8 {
        self.count.unwrap_or(20)
    }

    /// Effective safesearch setting (default Moderate).
    pub fn get_safesearch(&self) -> SafeSearch {
        self.safesearch.unwrap_or(SafeSearch::Moderate)
    }
}
