//! Reconnection backoff policy.
//!
//! The schedule is pure: attempt N waits `base * 2^(N-1)`, capped. With the
//! defaults that is 1s → 2s → 4s → 8s → 8s across five attempts, after
//! which the session fails terminally and a manual rejoin is required.

use std::time::Duration;

/// Base-doubling, capped exponential backoff with bounded attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(8),
            max_attempts: 5,
        }
    }
}

impl BackoffSchedule {
    /// Delay before the given 1-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let scaled = self.base.saturating_mul(1u32 << exponent);
        scaled.min(self.cap)
    }

    /// Whether the given 1-based attempt exceeds `max_attempts`.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}
