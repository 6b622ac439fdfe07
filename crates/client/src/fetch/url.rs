//! URL canonicalization for policy checks, caching and result identity.

use sift_core::FetchError;
use url::Url;

/// Query parameters that only carry click attribution.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
];

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for FetchError {
    fn from(err: UrlError) -> Self {
        FetchError::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string before any policy check or fetch.
///
/// Trims whitespace, defaults the scheme to https, lowercases the host and
/// drops the fragment. The query string is kept as-is.
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let Some(host) = parsed.host_str().map(str::to_lowercase) else {
        return Err(UrlError::InvalidUrl("missing host".into()));
    };
    parsed.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Remove attribution parameters, keeping the remaining pairs in order.
pub fn strip_tracking(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// Identity URL for a provider result, or None if it cannot be fetched.
pub fn result_url(raw: &str) -> Option<String> {
    let mut url = canonicalize(raw).ok()?;
    strip_tracking(&mut url);
    Some(url.into())
}
