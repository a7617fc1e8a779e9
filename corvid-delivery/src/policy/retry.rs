//! Exponential backoff with optional jitter
//!
//! The policy is a pure function of the attempt number; all mutable retry
//! state (counts, eligibility times) lives on the queued message.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy configuration
///
/// Immutable once constructed. The backoff formula is
/// `delay = min(base * 2^(attempt - 1), max)`, plus a uniformly random
/// amount in `[0, 0.25 * delay]` when jitter is enabled. With jitter
/// disabled the policy is fully deterministic, which the tests rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of send attempts before a message is dropped
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for the first retry (ms)
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the exponential backoff (ms)
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Add random jitter to spread out concurrent retries
    #[serde(default = "defaults::jitter_enabled")]
    pub jitter_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_enabled: defaults::jitter_enabled(),
        }
    }
}

impl RetryPolicy {
    /// Whether a message with this many failed attempts gets another try
    #[must_use]
    pub const fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_attempts
    }

    /// Remaining attempts before the message is dropped
    #[must_use]
    pub const fn remaining_attempts(&self, retry_count: u32) -> u32 {
        self.max_attempts.saturating_sub(retry_count)
    }

    /// Whether the next attempt is the last one in the budget
    #[must_use]
    pub const fn is_final_attempt(&self, retry_count: u32) -> bool {
        retry_count.saturating_add(1) >= self.max_attempts
    }

    /// Delay before the given attempt (1-indexed)
    ///
    /// Attempt 1 waits `base`, attempt 2 waits `2 * base`, and so on up to
    /// `max`. Saturating everywhere so absurd attempt numbers cap cleanly.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay_ms = if exponent >= 63 {
            self.max_delay_ms
        } else {
            self.base_delay_ms
                .saturating_mul(1u64 << exponent)
                .min(self.max_delay_ms)
        };

        let delay_ms = if self.jitter_enabled {
            delay_ms.saturating_add(rand::rng().random_range(0..=delay_ms / 4))
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        1000
    }

    pub const fn max_delay_ms() -> u64 {
        30_000
    }

    pub const fn jitter_enabled() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_delay_ms: u64, max_delay_ms: u64, jitter_enabled: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay_ms,
            max_delay_ms,
            jitter_enabled,
        }
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30_000);
        assert!(policy.jitter_enabled);
    }

    #[test]
    fn test_backoff_deterministic_without_jitter() {
        let policy = policy(1000, 10_000, false);

        let delays: Vec<u64> = (1..=5)
            .map(|attempt| u64::try_from(policy.backoff(attempt).as_millis()).unwrap())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000]);
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy = policy(1000, 10_000, false);
        assert_eq!(policy.backoff(20), Duration::from_millis(10_000));
        // Exponent large enough to overflow the shift must also cap.
        assert_eq!(policy.backoff(100), Duration::from_millis(10_000));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = policy(1000, 10_000, true);

        for _ in 0..100 {
            let delay = policy.backoff(2).as_millis();
            // 2000 plus up to a quarter on top
            assert!((2000..=2500).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_should_retry() {
        let policy = policy(1000, 10_000, false);

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn test_remaining_attempts() {
        let policy = policy(1000, 10_000, false);

        assert_eq!(policy.remaining_attempts(0), 5);
        assert_eq!(policy.remaining_attempts(4), 1);
        assert_eq!(policy.remaining_attempts(5), 0);
        assert_eq!(policy.remaining_attempts(9), 0); // saturating
    }

    #[test]
    fn test_is_final_attempt() {
        let policy = policy(1000, 10_000, false);

        assert!(!policy.is_final_attempt(0));
        assert!(!policy.is_final_attempt(3));
        assert!(policy.is_final_attempt(4));
        assert!(policy.is_final_attempt(5));
    }
}
