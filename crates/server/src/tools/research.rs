//! web_research tool implementation.
//!
//! Runs one query through provider fallback, policy-gated fetching and
//! ranking. Partial failures are reported in `summary`, not as errors.

use std::time::Duration;

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sift_client::Pipeline;
use sift_core::{Document, DomainHint, Error, FailureSummary, SearchRequest};

const MAX_RESULTS_CAP: usize = 20;
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Input parameters for web_research tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebResearchParams {
    /// Research query (required).
    pub query: String,

    /// Maximum ranked documents to return (1-20, default 5).
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Only consider sources from the last N days.
    #[serde(default)]
    pub recency_days: Option<u32>,

    /// Category hint: news, academic, technical or general.
    #[serde(default)]
    pub domain_hint: Option<DomainHint>,
}

fn default_max_results() -> usize {
    5
}

/// Output structure for web_research tool.
#[derive(Debug, Clone, Serialize)]
pub struct WebResearchOutput {
    pub documents: Vec<Document>,
    pub summary: FailureSummary,
    /// True when no documents came back or the deadline cut the run short.
    pub degraded: bool,
}

impl WebResearchParams {
    fn to_request(&self) -> Result<SearchRequest, Error> {
        if self.max_results > MAX_RESULTS_CAP {
            return Err(Error::InvalidInput(format!("max_results must be at most {MAX_RESULTS_CAP}")));
        }
        if self.recency_days == Some(0) {
            return Err(Error::InvalidInput("recency_days must be at least 1".into()));
        }

        let mut request = SearchRequest::new(self.query.clone(), self.max_results);
        if let Some(days) = self.recency_days {
            request = request.with_recency_window(DAY * days);
        }
        if let Some(hint) = self.domain_hint {
            request = request.with_domain_hint(hint);
        }
        request.validate()?;
        Ok(request)
    }
}

/// Implementation of the web_research tool.
pub async fn research_impl(pipeline: &Pipeline, params: WebResearchParams) -> Result<CallToolResult, McpError> {
    let request = params.to_request()?;
    let resolution = pipeline.resolve(&request).await?;

    let output = WebResearchOutput {
        degraded: resolution.is_degraded(),
        documents: resolution.documents,
        summary: resolution.summary,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str) -> WebResearchParams {
        WebResearchParams { query: query.into(), max_results: 3, recency_days: None, domain_hint: None }
    }

    #[test]
    fn test_defaults_from_json() {
        let parsed: WebResearchParams = serde_json::from_str(r#"{"query": "heat pumps"}"#).unwrap();
        assert_eq!(parsed.max_results, 5);
        assert!(parsed.recency_days.is_none());

        let parsed: WebResearchParams =
            serde_json::from_str(r#"{"query": "grid", "domain_hint": "news", "recency_days": 7}"#).unwrap();
        assert_eq!(parsed.domain_hint, Some(DomainHint::News));
    }

    #[test]
    fn test_to_request() {
        let request = WebResearchParams { recency_days: Some(7), domain_hint: Some(DomainHint::News), ..params("grid") }
            .to_request()
            .unwrap();
        assert_eq!(request.recency_window, Some(Duration::from_secs(7 * 86_400)));
        assert_eq!(request.domain_hint, Some(DomainHint::News));
        assert_eq!(request.max_results, 3);
    }

    #[test]
    fn test_to_request_rejects_bad_input() {
        assert!(params("   ").to_request().is_err());
        assert!(WebResearchParams { max_results: 0, ..params("grid") }.to_request().is_err());
        assert!(WebResearchParams { max_results: 21, ..params("grid") }.to_request().is_err());
        assert!(WebResearchParams { recency_days: Some(0), ..params("grid") }.to_request().is_err());
    }

    #[tokio::test]
    async fn test_invalid_query_maps_to_invalid_params() {
        let pipeline = Pipeline::from_config(&sift_core::AppConfig::default()).await.unwrap();
        let err = research_impl(&pipeline, params("")).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
