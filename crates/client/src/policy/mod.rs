//! Per-domain crawl permission checks.
//!
//! The gate answers allow/deny for a URL before any content fetch:
//!
//! 1. Configured domain lists. When an allowlist is set only listed
//!    domains pass; otherwise denylisted domains are refused. Subdomains
//!    match their parent entry.
//! 2. robots.txt, fetched on first use per domain (following up to
//!    [`MAX_REDIRECTS`] redirects) and cached as a [`PolicyRecord`] until it
//!    expires.
//!
//! A 4xx robots.txt means there is no policy and everything is allowed, as
//! does a body with no recognizable directives. Network errors, 5xx,
//! timeouts and oversize bodies are retried; if every attempt fails the
//! domain is denied (or allowed with `fail_open`) and the outcome is
//! cached for the shorter failure TTL.

pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sift_core::FetchError;
use sift_core::time::instant_after;
use tokio::time::Instant;
use url::Url;

use crate::fetch::{FetchTransport, MAX_REDIRECTS, RawResponse};

pub use rules::PolicyRule;

/// robots.txt bodies larger than this are treated as a fetch failure.
const MAX_POLICY_BYTES: usize = 512 * 1024;

/// Where a policy record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    /// Parsed from a robots.txt document.
    Document,
    /// robots.txt returned 4xx.
    Missing,
    /// robots.txt had no recognizable directives.
    Unparseable,
    /// robots.txt could not be retrieved.
    Unreachable,
    /// Inserted directly by the caller.
    Seeded,
}

/// Cached permission rules for one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRecord {
    pub domain: String,
    pub fetched_at: Instant,
    pub expires_at: Instant,
    pub rules: Vec<PolicyRule>,
    pub source: PolicySource,
}

impl PolicyRecord {
    pub fn new(domain: impl Into<String>, rules: Vec<PolicyRule>, source: PolicySource, ttl: Duration) -> Self {
        let now = Instant::now();
        Self { domain: domain.into(), fetched_at: now, expires_at: instant_after(now, ttl), rules, source }
    }

    pub fn allow_all(domain: impl Into<String>, source: PolicySource, ttl: Duration) -> Self {
        Self::new(domain, Vec::new(), source, ttl)
    }

    pub fn deny_all(domain: impl Into<String>, source: PolicySource, ttl: Duration) -> Self {
        Self::new(domain, vec![PolicyRule::new("*", "/", false)], source, ttl)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn allows(&self, user_agent: &str, path: &str) -> bool {
        rules::is_allowed(&self.rules, user_agent, path)
    }
}

/// Why a robots.txt fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyFetchError {
    #[error("robots.txt unreachable: {0}")]
    Unreachable(String),

    #[error("robots.txt returned status {0}")]
    Status(u16),

    #[error("robots.txt too large")]
    TooLarge,

    #[error("robots.txt fetch timed out")]
    Timeout,
}

/// Policy gate configuration.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// How long a retrieved policy stays valid (default: 24h)
    pub ttl: Duration,
    /// How long a failed retrieval is remembered (default: 10min)
    pub failure_ttl: Duration,
    /// Extra attempts after the first failure (default: 1)
    pub retries: u32,
    /// Per-attempt timeout (default: 5s)
    pub fetch_timeout: Duration,
    /// Allow instead of deny when robots.txt cannot be retrieved
    pub fail_open: bool,
    /// Whether robots.txt is consulted at all (default: true)
    pub respect_robots: bool,
    pub allowlist_domains: Vec<String>,
    pub denylist_domains: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            failure_ttl: Duration::from_secs(10 * 60),
            retries: 1,
            fetch_timeout: Duration::from_secs(5),
            fail_open: false,
            respect_robots: true,
            allowlist_domains: Vec::new(),
            denylist_domains: Vec::new(),
        }
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches("*.").trim_end_matches('.').to_lowercase()
}

fn domain_listed(host: &str, list: &[String]) -> bool {
    list.iter().any(|entry| host == entry || host.strip_suffix(entry.as_str()).is_some_and(|p| p.ends_with('.')))
}

/// Cache key for a URL's policy: host plus any explicit port.
pub fn domain_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Shared allow/deny oracle in front of every content fetch.
pub struct PolicyGate {
    transport: Arc<dyn FetchTransport>,
    records: DashMap<String, PolicyRecord>,
    config: PolicyConfig,
}

impl PolicyGate {
    pub fn new(transport: Arc<dyn FetchTransport>, mut config: PolicyConfig) -> Self {
        config.allowlist_domains = config.allowlist_domains.iter().map(|d| normalize_domain(d)).collect();
        config.denylist_domains = config.denylist_domains.iter().map(|d| normalize_domain(d)).collect();
        Self { transport, records: DashMap::new(), config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Whether `url` may be fetched by `user_agent`.
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let Some(host) = url.host_str().map(str::to_lowercase) else {
            return false;
        };

        if !self.config.allowlist_domains.is_empty() {
            if !domain_listed(&host, &self.config.allowlist_domains) {
                tracing::debug!(%host, "host not in allowlist");
                return false;
            }
        } else if domain_listed(&host, &self.config.denylist_domains) {
            tracing::debug!(%host, "host denylisted");
            return false;
        }

        if !self.config.respect_robots {
            return true;
        }

        let Some(domain) = domain_key(url) else {
            return false;
        };
        let record = match self.record(&domain) {
            Some(record) => record,
            None => self.refresh(url, &domain).await,
        };

        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let allowed = record.allows(user_agent, &path);
        if !allowed {
            tracing::debug!(%domain, %path, source = ?record.source, "disallowed by policy");
        }
        allowed
    }

    /// Store a record directly, replacing any cached one.
    pub fn insert_record(&self, record: PolicyRecord) {
        self.records.insert(record.domain.clone(), record);
    }

    /// Live record for `domain`, if cached and not expired.
    pub fn record(&self, domain: &str) -> Option<PolicyRecord> {
        let record = self.records.get(domain)?;
        if record.is_expired() { None } else { Some(record.clone()) }
    }

    /// Drop expired records, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired());
        before.saturating_sub(self.records.len())
    }

    async fn refresh(&self, url: &Url, domain: &str) -> PolicyRecord {
        let record = match self.fetch_policy(url, domain).await {
            Ok(record) => record,
            Err(err) if self.config.fail_open => {
                tracing::warn!(%domain, error = %err, "policy unavailable, failing open");
                PolicyRecord::allow_all(domain, PolicySource::Unreachable, self.config.failure_ttl)
            }
            Err(err) => {
                tracing::warn!(%domain, error = %err, "policy unavailable, denying domain");
                PolicyRecord::deny_all(domain, PolicySource::Unreachable, self.config.failure_ttl)
            }
        };
        self.insert_record(record.clone());
        record
    }

    async fn fetch_policy(&self, url: &Url, domain: &str) -> Result<PolicyRecord, PolicyFetchError> {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let mut last_err = PolicyFetchError::Unreachable("no attempt made".into());
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
            }

            match self.fetch_once(&robots_url, domain).await {
                Ok(record) => return Ok(record),
                Err(PolicyFetchError::TooLarge) => return Err(PolicyFetchError::TooLarge),
                Err(err) => {
                    tracing::debug!(%domain, attempt, error = %err, "robots.txt attempt failed");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn fetch_once(&self, robots_url: &Url, domain: &str) -> Result<PolicyRecord, PolicyFetchError> {
        let response = tokio::time::timeout(self.config.fetch_timeout, self.get_following(robots_url))
            .await
            .map_err(|_| PolicyFetchError::Timeout)??;

        let ttl = self.config.ttl;
        match response.status {
            200..=299 => {
                let body = String::from_utf8_lossy(&response.body);
                Ok(match rules::parse(&body) {
                    Some(rules) => PolicyRecord::new(domain, rules, PolicySource::Document, ttl),
                    None => PolicyRecord::allow_all(domain, PolicySource::Unparseable, ttl),
                })
            }
            400..=499 => Ok(PolicyRecord::allow_all(domain, PolicySource::Missing, ttl)),
            status => Err(PolicyFetchError::Status(status)),
        }
    }

    /// robots.txt redirects are followed without consulting policy.
    async fn get_following(&self, robots_url: &Url) -> Result<RawResponse, PolicyFetchError> {
        let mut current = robots_url.clone();
        for _ in 0..=MAX_REDIRECTS {
            let response = self.transport.get(&current, MAX_POLICY_BYTES).await.map_err(|e| match e {
                FetchError::TooLarge { .. } => PolicyFetchError::TooLarge,
                FetchError::Timeout(_) => PolicyFetchError::Timeout,
                other => PolicyFetchError::Unreachable(other.to_string()),
            })?;
            match response.redirect_target() {
                Some(target) => current = target,
                None => return Ok(response),
            }
        }
        Err(PolicyFetchError::Unreachable(format!("{robots_url}: more than {MAX_REDIRECTS} redirects")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves one fixed robots.txt response and counts calls.
    struct RobotsStub {
        status: u16,
        body: &'static str,
        calls: AtomicUsize,
    }

    impl RobotsStub {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self { status, body, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl FetchTransport for RobotsStub {
        async fn get(&self, url: &Url, _max_bytes: usize) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.status == 0 {
                return Err(FetchError::ConnectionFailed("refused".into()));
            }
            Ok(RawResponse {
                url: url.clone(),
                status: self.status,
                location: None,
                content_type: Some("text/plain".into()),
                body: Bytes::from_static(self.body.as_bytes()),
                fetch_ms: 0,
            })
        }
    }

    /// robots.txt on the bare host redirects to the www host.
    struct MovedRobots;

    #[async_trait]
    impl FetchTransport for MovedRobots {
        async fn get(&self, url: &Url, _max_bytes: usize) -> Result<RawResponse, FetchError> {
            let (status, location, body) = match url.host_str() {
                Some("example.com") => (301, Some("https://www.example.com/robots.txt".to_string()), ""),
                _ => (200, None, "User-agent: *\nDisallow: /private\n"),
            };
            Ok(RawResponse {
                url: url.clone(),
                status,
                location,
                content_type: Some("text/plain".into()),
                body: Bytes::from_static(body.as_bytes()),
                fetch_ms: 0,
            })
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn gate(stub: Arc<RobotsStub>, config: PolicyConfig) -> PolicyGate {
        PolicyGate::new(stub, config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_robots_rules_cached() {
        let stub = RobotsStub::new(200, "User-agent: *\nDisallow: /private\n");
        let gate = gate(stub.clone(), PolicyConfig::default());

        assert!(gate.is_allowed(&url("https://example.com/news"), "sift/0.1").await);
        assert!(!gate.is_allowed(&url("https://example.com/private/a"), "sift/0.1").await);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        let record = gate.record("example.com").unwrap();
        assert_eq!(record.source, PolicySource::Document);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_refreshed_after_ttl() {
        let stub = RobotsStub::new(200, "User-agent: *\nAllow: /\n");
        let config = PolicyConfig { ttl: Duration::from_secs(60), ..Default::default() };
        let gate = gate(stub.clone(), config);

        gate.is_allowed(&url("https://example.com/"), "sift").await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(gate.record("example.com").is_none());
        gate.is_allowed(&url("https://example.com/"), "sift").await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_robots_allows() {
        let gate = gate(RobotsStub::new(404, ""), PolicyConfig::default());
        assert!(gate.is_allowed(&url("https://example.com/anything"), "sift").await);
        assert_eq!(gate.record("example.com").unwrap().source, PolicySource::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_body_allows() {
        let gate = gate(RobotsStub::new(200, "<html>oops</html>"), PolicyConfig::default());
        assert!(gate.is_allowed(&url("https://example.com/a"), "sift").await);
        assert_eq!(gate.record("example.com").unwrap().source, PolicySource::Unparseable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_fails_closed_after_retries() {
        let stub = RobotsStub::new(503, "");
        let config = PolicyConfig { retries: 2, ..Default::default() };
        let gate = gate(stub.clone(), config);

        assert!(!gate.is_allowed(&url("https://example.com/a"), "sift").await);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        assert_eq!(gate.record("example.com").unwrap().source, PolicySource::Unreachable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_cached_for_failure_ttl() {
        let stub = RobotsStub::new(0, "");
        let config = PolicyConfig { retries: 0, failure_ttl: Duration::from_secs(30), ..Default::default() };
        let gate = gate(stub.clone(), config);

        assert!(!gate.is_allowed(&url("https://example.com/a"), "sift").await);
        assert!(!gate.is_allowed(&url("https://example.com/b"), "sift").await);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(gate.evict_expired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_open() {
        let config = PolicyConfig { retries: 0, fail_open: true, ..Default::default() };
        let gate = gate(RobotsStub::new(0, ""), config);
        assert!(gate.is_allowed(&url("https://example.com/a"), "sift").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_deny_overrides_fetch() {
        let stub = RobotsStub::new(200, "User-agent: *\nAllow: /\n");
        let gate = gate(stub.clone(), PolicyConfig::default());
        gate.insert_record(PolicyRecord::deny_all("example.com", PolicySource::Seeded, Duration::from_secs(60)));

        assert!(!gate.is_allowed(&url("https://example.com/a"), "sift").await);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_domain_lists() {
        let config = PolicyConfig {
            denylist_domains: vec!["Blocked.example".into()],
            respect_robots: false,
            ..Default::default()
        };
        let gate = gate(RobotsStub::new(404, ""), config);
        assert_eq!(gate.config().denylist_domains, vec!["blocked.example".to_string()]);
        assert!(!gate.is_allowed(&url("https://blocked.example/a"), "sift").await);
        assert!(!gate.is_allowed(&url("https://news.blocked.example/a"), "sift").await);
        assert!(gate.is_allowed(&url("https://notblocked.example/a"), "sift").await);

        let config = PolicyConfig {
            allowlist_domains: vec!["example.org".into()],
            denylist_domains: vec!["example.org".into()],
            respect_robots: false,
            ..Default::default()
        };
        let gate = PolicyGate::new(RobotsStub::new(404, ""), config);
        assert!(gate.is_allowed(&url("https://docs.example.org/a"), "sift").await);
        assert!(!gate.is_allowed(&url("https://example.com/a"), "sift").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_evaluated() {
        let stub = RobotsStub::new(200, "User-agent: *\nDisallow: /search?q=\n");
        let gate = gate(stub, PolicyConfig::default());
        assert!(!gate.is_allowed(&url("https://example.com/search?q=solar"), "sift").await);
        assert!(gate.is_allowed(&url("https://example.com/search"), "sift").await);
    }

    #[test]
    fn test_domain_key_includes_port() {
        assert_eq!(domain_key(&url("https://Example.com/a")).as_deref(), Some("example.com"));
        assert_eq!(domain_key(&url("http://example.com:8080/a")).as_deref(), Some("example.com:8080"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_robots_redirect_followed() {
        let gate = PolicyGate::new(Arc::new(MovedRobots), PolicyConfig::default());

        assert!(!gate.is_allowed(&url("https://example.com/private/a"), "sift").await);
        assert!(gate.is_allowed(&url("https://example.com/news"), "sift").await);
        assert_eq!(gate.record("example.com").unwrap().source, PolicySource::Document);
    }
}
