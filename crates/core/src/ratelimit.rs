//! Per-provider sliding-window rate limiting.
//!
//! Each provider keeps a window of recent call timestamps. A call is
//! permitted when the window has room and the minimum spacing since the
//! previous call has elapsed. The check and the record happen under the
//! provider's map shard lock, so two callers can never both take the last
//! slot while distinct providers proceed independently.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::types::ProviderId;

/// Limits for a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Calls allowed within one rolling window.
    pub max_per_window: usize,
    /// Length of the rolling window in milliseconds.
    pub window_ms: u64,
    /// Minimum spacing between consecutive calls in milliseconds.
    #[serde(default)]
    pub min_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_per_window: 60, window_ms: 60_000, min_interval_ms: 1_000 }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Outcome of [`RateLimiter::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The call was recorded and may proceed.
    Permit,
    /// No slot is free; one opens after `retry_after`.
    Denied { retry_after: Duration },
}

/// Shared rate limiter keyed by provider.
#[derive(Debug)]
pub struct RateLimiter {
    default: RateLimitConfig,
    overrides: HashMap<ProviderId, RateLimitConfig>,
    windows: DashMap<ProviderId, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(default: RateLimitConfig) -> Self {
        Self { default, overrides: HashMap::new(), windows: DashMap::new() }
    }

    /// Build from the configured default plus per-provider overrides.
    pub fn from_config(default: RateLimitConfig, overrides: &BTreeMap<String, RateLimitConfig>) -> Self {
        let overrides = overrides
            .iter()
            .map(|(id, limit)| (ProviderId::new(id.trim().to_lowercase()), *limit))
            .collect();
        Self { default, overrides, windows: DashMap::new() }
    }

    pub fn with_override(mut self, provider: ProviderId, limit: RateLimitConfig) -> Self {
        self.overrides.insert(provider, limit);
        self
    }

    pub fn limit_for(&self, provider: &ProviderId) -> RateLimitConfig {
        self.overrides.get(provider).copied().unwrap_or(self.default)
    }

    /// Try to take a slot for `provider` without blocking.
    pub fn acquire(&self, provider: &ProviderId) -> Acquire {
        let limit = self.limit_for(provider);
        let window = limit.window();
        let now = Instant::now();

        let mut calls = self.windows.entry(provider.clone()).or_default();

        while let Some(&first) = calls.front() {
            if now.duration_since(first) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }

        if let Some(&last) = calls.back() {
            let since = now.duration_since(last);
            if since < limit.min_interval() {
                return Acquire::Denied { retry_after: limit.min_interval() - since };
            }
        }

        if calls.len() >= limit.max_per_window {
            let retry_after = calls
                .front()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window);
            return Acquire::Denied { retry_after };
        }

        calls.push_back(now);
        Acquire::Permit
    }

    /// Calls still available to `provider` in the current window.
    pub fn remaining(&self, provider: &ProviderId) -> usize {
        let limit = self.limit_for(provider);
        let now = Instant::now();
        self.windows
            .get(provider)
            .map(|calls| calls.iter().filter(|&&at| now.duration_since(at) < limit.window()).count())
            .map_or(limit.max_per_window, |used| limit.max_per_window.saturating_sub(used))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
