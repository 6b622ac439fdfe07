//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SIFT_*)
//! 2. TOML config file (if SIFT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::ratelimit::RateLimitConfig;
use crate::types::ProviderId;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SIFT_*)
/// 2. TOML config file (if SIFT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Brave Search API subscription token.
    ///
    /// Set via SIFT_BRAVE_API_KEY. The `brave` provider is skipped without it.
    #[serde(default)]
    pub brave_api_key: Option<String>,

    /// Serper API key.
    ///
    /// Set via SIFT_SERPER_API_KEY. The `serper` provider is skipped without it.
    #[serde(default)]
    pub serper_api_key: Option<String>,

    /// Provider fallback order, highest priority first.
    #[serde(default = "default_provider_order")]
    pub provider_order: Vec<String>,

    /// User-Agent string for HTTP requests and robots.txt evaluation.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to read per fetched document.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Deadline for a whole resolve call in milliseconds.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    /// Longest rate-limit wait the orchestrator will sit out before skipping.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Maximum concurrent document fetches.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    /// Capacity of each in-memory cache.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Search cache TTL used when a request has no recency window.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_default_ttl_secs: u64,

    /// TTL for extracted documents.
    #[serde(default = "default_document_ttl_secs")]
    pub document_ttl_secs: u64,

    /// TTL for robots.txt policy records.
    #[serde(default = "default_cache_ttl_secs")]
    pub policy_ttl_secs: u64,

    /// Extra robots.txt fetch attempts after the first failure.
    #[serde(default = "default_policy_retries")]
    pub policy_retries: u32,

    /// Allow fetches when robots.txt cannot be retrieved.
    #[serde(default)]
    pub policy_fail_open: bool,

    /// Whether to respect robots.txt rules.
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Refuse to connect to private, loopback and link-local addresses.
    #[serde(default = "default_true")]
    pub block_private_addresses: bool,

    /// Domain allowlist for fetch operations.
    ///
    /// Set via SIFT_ALLOWLIST_DOMAINS environment variable.
    #[serde(default)]
    pub allowlist_domains: Vec<String>,

    /// Domain denylist for fetch operations.
    #[serde(default)]
    pub denylist_domains: Vec<String>,

    /// Rate limit applied to providers without an override.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Per-provider rate limit overrides, keyed by provider id.
    ///
    /// Set via e.g. SIFT_PROVIDER_RATE_LIMITS__DUCKDUCKGO__MIN_INTERVAL_MS.
    #[serde(default)]
    pub provider_rate_limits: BTreeMap<String, RateLimitConfig>,

    /// Write search results through to the SQLite tier.
    #[serde(default)]
    pub persist_cache: bool,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_provider_order() -> Vec<String> {
    vec!["brave".into(), "serper".into(), "duckduckgo".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sift-cache.sqlite")
}

fn default_user_agent() -> String {
    "sift/0.1".into()
}

fn default_max_bytes() -> usize {
    2_097_152 // 2MB
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_request_deadline_ms() -> u64 {
    30_000
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_fan_out() -> usize {
    4
}

fn default_cache_max_entries() -> usize {
    1_000
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

fn default_document_ttl_secs() -> u64 {
    3_600
}

fn default_policy_retries() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            serper_api_key: None,
            provider_order: default_provider_order(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            request_deadline_ms: default_request_deadline_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            fan_out: default_fan_out(),
            cache_max_entries: default_cache_max_entries(),
            cache_default_ttl_secs: default_cache_ttl_secs(),
            document_ttl_secs: default_document_ttl_secs(),
            policy_ttl_secs: default_cache_ttl_secs(),
            policy_retries: default_policy_retries(),
            policy_fail_open: false,
            respect_robots: true,
            block_private_addresses: true,
            allowlist_domains: Vec::new(),
            denylist_domains: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            provider_rate_limits: BTreeMap::new(),
            persist_cache: false,
            db_path: default_db_path(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("AppConfig")
            .field("brave_api_key", &redact(&self.brave_api_key))
            .field("serper_api_key", &redact(&self.serper_api_key))
            .field("provider_order", &self.provider_order)
            .field("user_agent", &self.user_agent)
            .field("max_bytes", &self.max_bytes)
            .field("timeout_ms", &self.timeout_ms)
            .field("request_deadline_ms", &self.request_deadline_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("fan_out", &self.fan_out)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("cache_default_ttl_secs", &self.cache_default_ttl_secs)
            .field("document_ttl_secs", &self.document_ttl_secs)
            .field("policy_ttl_secs", &self.policy_ttl_secs)
            .field("policy_retries", &self.policy_retries)
            .field("policy_fail_open", &self.policy_fail_open)
            .field("respect_robots", &self.respect_robots)
            .field("block_private_addresses", &self.block_private_addresses)
            .field("allowlist_domains", &self.allowlist_domains)
            .field("denylist_domains", &self.denylist_domains)
            .field("rate_limit", &self.rate_limit)
            .field("provider_rate_limits", &self.provider_rate_limits)
            .field("persist_cache", &self.persist_cache)
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl AppConfig {
    /// Per-fetch timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn cache_default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl_secs)
    }

    pub fn document_ttl(&self) -> Duration {
        Duration::from_secs(self.document_ttl_secs)
    }

    pub fn policy_ttl(&self) -> Duration {
        Duration::from_secs(self.policy_ttl_secs)
    }

    /// Fallback order as provider ids.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.provider_order.iter().map(|id| ProviderId::new(id.trim().to_lowercase())).collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SIFT_`
    /// 2. TOML file from `SIFT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SIFT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("SIFT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
