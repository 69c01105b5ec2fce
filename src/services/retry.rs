// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retry policy for transient provider failures.

use crate::config::Config;
use std::time::Duration;

/// Upper bound on any single wait, including provider-requested ones.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per city per cycle, including the first.
    pub max_attempts: u32,
    /// Wait after the first failure.
    pub base_delay: Duration,
    /// Growth factor per further failure.
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: 2.0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_attempts, config.retry_base_delay)
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before the next attempt, after `attempts` failures (1-indexed).
    ///
    /// `base_delay * multiplier^(attempts - 1)`, raised to `retry_after` when
    /// the provider asked for longer, and capped at one minute.
    pub fn next_delay(&self, attempts: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        // Overflowing or non-finite backoff saturates at the cap
        let backoff = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_DELAY);
        backoff
            .max(retry_after.unwrap_or_default())
            .min(MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_increases() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.next_delay(1, None), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2, None), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3, None), Duration::from_secs(8));
    }

    #[test]
    fn retry_after_raises_but_never_exceeds_cap() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.next_delay(1, Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            policy.next_delay(2, Some(Duration::from_secs(1))),
            Duration::from_secs(4)
        );
        assert_eq!(
            policy.next_delay(1, Some(Duration::from_secs(3600))),
            MAX_RETRY_DELAY
        );
        assert_eq!(policy.next_delay(40, None), MAX_RETRY_DELAY);
    }

    #[test]
    fn huge_base_delay_saturates() {
        let policy = RetryPolicy::new(20, Duration::from_millis(u64::MAX));
        assert_eq!(policy.next_delay(1, None), MAX_RETRY_DELAY);
        assert_eq!(policy.next_delay(16, None), MAX_RETRY_DELAY);

        let policy = RetryPolicy::new(20, Duration::MAX);
        assert_eq!(policy.next_delay(20, None), MAX_RETRY_DELAY);
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
