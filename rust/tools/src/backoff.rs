use std::time::Duration;

/// Upper bound on the delay between polls while failing.
pub const MAX_BACKOFF: Duration = Duration::from_millis(120_000);

/// Above this many consecutive errors a tick is skipped instead of fetched.
pub const THROTTLE_THRESHOLD: u32 = 5;

/// Hard limit on a single fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Exponential backoff derived from the consecutive-error count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    throttle_threshold: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: MAX_BACKOFF,
            throttle_threshold: THROTTLE_THRESHOLD,
        }
    }

    /// `base` while healthy, `min(base * 2^errors, max)` while failing.
    pub fn delay_for(&self, error_count: u32) -> Duration {
        if error_count == 0 {
            return self.base;
        }
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let factor = 1u64.checked_shl(error_count).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor)).min(self.max)
    }

    /// Whether the next tick should skip the network call.
    pub fn should_skip(&self, error_count: u32) -> bool {
        error_count > self.throttle_threshold
    }
}
