//! Retry policy: exponential backoff with jitter, bounded by a maximum
//! attempt count, per §4.3's "transient failures get retried with
//! jittered backoff up to `maxAttempts`; the scheduler never retries a
//! `Failed` or `Cancelled` outcome."

use anvil_types::action::{ActionOutcome, RetryClass};
use rand::Rng;
use std::time::Duration;

/// Governs whether and how long to wait before a retry attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first), inclusive.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each attempt after that.
    pub base_backoff: Duration,
    /// Upper bound on backoff, regardless of attempt count.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Whether `outcome`, having just completed attempt `attempt`, should be
    /// retried under this policy.
    #[must_use]
    pub fn should_retry(&self, outcome: &ActionOutcome, attempt: u32) -> bool {
        outcome.retry_class() == RetryClass::Retryable && attempt < self.max_attempts
    }

    /// Backoff duration before attempt `next_attempt` (2-based: the retry
    /// following attempt 1 is `next_attempt == 2`), with full jitter in
    /// `[0, computed)` so a burst of simultaneously-failing actions doesn't
    /// retry in lockstep.
    #[must_use]
    pub fn backoff(&self, next_attempt: u32, rng: &mut impl Rng) -> Duration {
        let exponent = next_attempt.saturating_sub(2).min(20);
        let scaled = self.base_backoff.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
        let capped = scaled.min(self.max_backoff);
        if capped.is_zero() {
            return capped;
        }
        let jitter_millis = rng.gen_range(0..=capped.as_millis().max(1) as u64);
        Duration::from_millis(jitter_millis)
    }
}
