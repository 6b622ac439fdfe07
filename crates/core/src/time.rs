//! Overflow-safe instant arithmetic.
//!
//! TTLs and deadlines come from configuration and from provider headers, so
//! `now + ttl` is clamped instead of panicking on absurd values.

use std::time::Duration;

use tokio::time::Instant;

/// Longest span added to an instant; anything beyond is treated as "never".
pub const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `now + span`, clamped to [`FAR_FUTURE`].
pub fn instant_after(now: Instant, span: Duration) -> Instant {
    now.checked_add(span.min(FAR_FUTURE)).unwrap_or(now)
}

/// Whole seconds of `span` as an `i64`, saturating.
pub fn whole_seconds(span: Duration) -> i64 {
    i64::try_from(span.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_instant_after_clamps() {
        let now = Instant::now();
        assert_eq!(instant_after(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert_eq!(instant_after(now, Duration::MAX), now + FAR_FUTURE);
    }

    #[test]
    fn test_whole_seconds_saturates() {
        assert_eq!(whole_seconds(Duration::from_secs(90)), 90);
        assert_eq!(whole_seconds(Duration::MAX), i64::MAX);
    }
}
