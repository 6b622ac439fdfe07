//! Fallback states and the backoff decision.

use std::time::Duration;

use serde::Serialize;
use sift_core::time::instant_after;
use sift_core::{FailureSummary, ProviderId, ProviderResult};
use tokio::time::Instant;

/// Backoff waits allowed per provider before it is skipped.
pub const MAX_BACKOFF_ROUNDS: u32 = 3;

/// Where a resolve run currently is.
///
/// ```text
/// Idle ──cache hit──────────────────────────────► Resolved
///  │
///  └─► Awaiting(p) ──permit, results─────────────► Resolved
///        │   ▲  │
///        │   │  └─denied, wait fits──► Backoff(p, until)
///        │   └──────────────────────────┘
///        └─failed / skipped──► Awaiting(next) … ──► Exhausted
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackState {
    Idle,
    Awaiting(ProviderId),
    Backoff(ProviderId, Instant),
    Exhausted,
    Resolved,
}

impl FallbackState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Resolved)
    }
}

/// What to do after the rate limiter refuses a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeniedAction {
    /// Sleep until the instant, then ask the limiter again.
    Wait(Instant),
    /// Record the provider as rate limited and move on.
    Skip,
}

/// Back off only when the wait is short, finishes before the deadline and
/// the provider has not already used up its rounds.
pub fn on_denied(
    now: Instant,
    retry_after: Duration,
    max_backoff: Duration,
    deadline: Instant,
    rounds_used: u32,
) -> DeniedAction {
    let until = instant_after(now, retry_after);
    if retry_after <= max_backoff && until < deadline && rounds_used < MAX_BACKOFF_ROUNDS {
        DeniedAction::Wait(until)
    } else {
        DeniedAction::Skip
    }
}

/// Outcome of a fallback run. Never an error: an empty `results` comes
/// with a summary explaining why.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolved {
    pub results: Vec<ProviderResult>,
    pub summary: FailureSummary,
    /// Provider whose results were used; None on a cache hit or exhaustion.
    pub served_by: Option<ProviderId>,
}
