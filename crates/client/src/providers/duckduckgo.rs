//! DuckDuckGo HTML adapter.
//!
//! Scrapes the JavaScript-free endpoint at `https://html.duckduckgo.com/html/`.
//! No key is needed, which makes it the usual last resort in the fallback
//! order. DuckDuckGo answers suspected bots with HTTP 202 or an "anomaly"
//! challenge page; both are reported as rate limiting.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header;
use scraper::{Html, Selector};
use sift_core::{ProviderError, ProviderId, ProviderResult, SearchRequest};
use url::Url;

use super::{Freshness, SearchProvider, build_http, finish, send_error, status_error};
use crate::fetch::result_url;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com/html/";

/// Markers of the bot challenge page.
const CHALLENGE_MARKERS: &[&str] = &["anomaly-modal", "bots use DuckDuckGo too", "challenge-form"];

const RESULT_SELECTOR: &str =
    ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)";

#[derive(Debug, Clone)]
pub struct DuckDuckGoConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for DuckDuckGoConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), timeout: Duration::from_secs(10), user_agent: "sift/0.1".into() }
    }
}

#[derive(Debug)]
pub struct DuckDuckGoProvider {
    id: ProviderId,
    http: reqwest::Client,
    config: DuckDuckGoConfig,
}

impl DuckDuckGoProvider {
    pub fn new(config: DuckDuckGoConfig) -> Result<Self, ProviderError> {
        let http = build_http(config.timeout, &config.user_agent)?;
        Ok(Self { id: ProviderId::new("duckduckgo"), http, config })
    }
}

/// Unwrap DuckDuckGo's `//duckduckgo.com/l/?uddg=<target>` redirect links.
fn unwrap_redirect(href: &str) -> Option<String> {
    let full = if href.starts_with("//") { format!("https:{href}") } else { href.to_string() };
    let parsed = Url::parse(&full).ok()?;

    if parsed.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) && parsed.path().starts_with("/l/") {
        parsed.query_pairs().find(|(key, _)| key == "uddg").map(|(_, value)| value.into_owned())
    } else {
        Some(full)
    }
}

fn is_challenge(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| html.contains(marker))
}

/// Parse a results page. Ads and entries without a usable link are skipped.
pub(crate) fn parse_results(html: &str, provider_id: &ProviderId) -> Result<Vec<ProviderResult>, ProviderError> {
    let selector = |s: &str| {
        Selector::parse(s).map_err(|e| ProviderError::InvalidResponse(format!("invalid selector {s}: {e:?}")))
    };
    let result_sel = selector(RESULT_SELECTOR)?;
    let title_sel = selector(".result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };
        let title = title_el.text().collect::<String>().trim().to_string();
        let Some(url) = title_el.value().attr("href").and_then(unwrap_redirect).and_then(|u| result_url(&u)) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        results.push(ProviderResult {
            provider_id: provider_id.clone(),
            url,
            title,
            snippet,
            published_at: None,
            rank_hint: results.len() + 1,
        });
    }

    Ok(results)
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn query(&self, request: &SearchRequest) -> Result<Vec<ProviderResult>, ProviderError> {
        let mut form = vec![("q", request.query.trim().to_string())];
        if let Some(freshness) = Freshness::from_window(request.recency_window) {
            form.push(("df", freshness.letter().to_string()));
        }

        let response = self
            .http
            .post(&self.config.base_url)
            .form(&form)
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            tracing::debug!("DuckDuckGo returned 202, treating as bot challenge");
            return Err(ProviderError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            return Err(status_error(status, response.headers()));
        }

        let html = response.text().await.map_err(|e| send_error(&e))?;
        if is_challenge(&html) {
            tracing::debug!("DuckDuckGo served a challenge page");
            return Err(ProviderError::RateLimited { retry_after: None });
        }

        let results = parse_results(&html, &self.id)?;
        tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
        finish(results, request.max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
<div class="result results_links results_links_deep web-result result--ad">
    <a class="result__a" href="https://ads.example/buy">Sponsored</a>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.iea.org%2Freports%2Frenewables-2024%3Futm_source%3Dddg&amp;rut=abc123">
        Renewables 2024 - IEA
    </a>
    <div class="result__snippet">
        Global renewable capacity
        additions rose in 2024.
    </div>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a" href="https://en.wikipedia.org/wiki/Renewable_energy">Renewable energy - Wikipedia</a>
</div>
<div class="result results_links results_links_deep web-result">
    <a class="result__a">No link</a>
</div>
</body>
</html>"#;

    #[test]
    fn test_unwrap_redirect() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(unwrap_redirect(href), Some("https://example.com/page".to_string()));
        assert_eq!(unwrap_redirect("https://example.com/direct"), Some("https://example.com/direct".to_string()));
    }

    #[test]
    fn test_parse_results() {
        let results = parse_results(RESULTS_HTML, &ProviderId::new("duckduckgo")).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].url, "https://www.iea.org/reports/renewables-2024");
        assert_eq!(results[0].title, "Renewables 2024 - IEA");
        assert_eq!(results[0].snippet, "Global renewable capacity additions rose in 2024.");
        assert_eq!(results[0].rank_hint, 1);

        assert_eq!(results[1].url, "https://en.wikipedia.org/wiki/Renewable_energy");
        assert!(results[1].snippet.is_empty());
        assert_eq!(results[1].rank_hint, 2);
    }

    #[test]
    fn test_challenge_detection() {
        let page = r#"<div class="anomaly-modal__title">Unfortunately, bots use DuckDuckGo too.</div>"#;
        assert!(is_challenge(page));
        assert!(!is_challenge(RESULTS_HTML));
    }

    #[test]
    fn test_no_results_page() {
        let html = "<html><body><div class=\"no-results\">No results.</div></body></html>";
        let results = parse_results(html, &ProviderId::new("duckduckgo")).unwrap();
        assert!(results.is_empty());
        assert_eq!(finish(results, 5), Err(ProviderError::Empty));
    }
}
