//! Bounded retry policy with exponential backoff.
//!
//! Only idempotent operations (status polls, result fetches) are retried.
//! Delays are deterministic: no jitter, so trial timing is reproducible.

use std::time::Duration;

/// How many consecutive transient errors to absorb, and how long to wait
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed before a transient error is escalated.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_delay` defaults to 30s.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Policy that escalates on the first transient error.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Set the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Whether another retry is allowed after `consecutive` failures so far.
    pub fn allows(&self, consecutive: u32) -> bool {
        consecutive < self.max_retries
    }

    /// Delay before retry number `attempt` (1-based).
    ///
    /// Formula: min(max_delay, base_delay * 2^(attempt-1))
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
