//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::ratelimit::RateLimitConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// Upper bound for every cache and policy TTL: 30 days.
const MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound for the per-request deadline: 10 minutes.
const MAX_DEADLINE_MS: u64 = 600_000;

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl RateLimitConfig {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.max_per_window == 0 {
            return Err(invalid(field, "max_per_window must be greater than 0"));
        }
        if self.window_ms == 0 {
            return Err(invalid(field, "window_ms must be greater than 0"));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `request_deadline_ms` is shorter than `timeout_ms` or exceeds 10 minutes
    /// - `max_backoff_ms` exceeds `request_deadline_ms`
    /// - a cache or policy TTL exceeds 30 days
    /// - `fan_out` or `cache_max_entries` is 0
    /// - `user_agent` is empty or `provider_order` has no entries
    /// - a rate limit has a zero window or zero capacity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.request_deadline_ms < self.timeout_ms {
            return Err(invalid("request_deadline_ms", "must not be shorter than timeout_ms"));
        }
        if self.request_deadline_ms > MAX_DEADLINE_MS {
            return Err(invalid("request_deadline_ms", "must not exceed 10 minutes (600000ms)"));
        }
        if self.max_backoff_ms > self.request_deadline_ms {
            return Err(invalid("max_backoff_ms", "must not exceed request_deadline_ms"));
        }

        for (field, secs) in [
            ("cache_default_ttl_secs", self.cache_default_ttl_secs),
            ("document_ttl_secs", self.document_ttl_secs),
            ("policy_ttl_secs", self.policy_ttl_secs),
        ] {
            if secs > MAX_TTL_SECS {
                return Err(invalid(field, "must not exceed 30 days (2592000s)"));
            }
        }

        if self.fan_out == 0 {
            return Err(invalid("fan_out", "must be greater than 0"));
        }
        if self.cache_max_entries == 0 {
            return Err(invalid("cache_max_entries", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.provider_order.iter().all(|id| id.trim().is_empty()) {
            return Err(invalid("provider_order", "must name at least one provider"));
        }

        self.rate_limit.validate("rate_limit")?;
        for (provider, limit) in &self.provider_rate_limits {
            limit.validate(&format!("provider_rate_limits.{provider}"))?;
        }

        if !self.allowlist_domains.is_empty() && !self.denylist_domains.is_empty() {
            tracing::warn!(
                allowlist_count = self.allowlist_domains.len(),
                denylist_count = self.denylist_domains.len(),
                "Both allowlist_domains and denylist_domains are set; \
                 allowlist takes precedence"
            );
        }

        if self.policy_fail_open {
            tracing::warn!("policy_fail_open is set; unreachable robots.txt will allow fetches");
        }

        Ok(())
    }
}
