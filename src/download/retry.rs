//! Retry policy with capped exponential backoff.
//!
//! Every transfer failure is retried until the budget is spent. From the
//! client side a flaky archive server's transient failures cannot be told
//! apart from permanent ones, so the policy does not classify errors.
//!
//! The delay before a retry is a pure function of the attempt that just
//! failed, see [`backoff_delay`]:
//!
//! ```text
//! attempt:  1    2     3     4     5     6 ...
//! delay:    500  1000  2000  4000  8000  8000 ... (ms)
//! ```
//!
//! # Example
//!
//! ```
//! use cqww_core::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3);
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::debug;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound for any single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_millis(8000);

/// Returns the default backoff delay after `attempt` (1-indexed) failed.
///
/// Doubles from [`INITIAL_BACKOFF`] and is capped at [`MAX_BACKOFF`].
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    scaled_delay(attempt, INITIAL_BACKOFF, MAX_BACKOFF)
}

fn scaled_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let factor = 2u32.saturating_pow(exponent);
    initial.saturating_mul(factor).min(max)
}

/// Decision on whether to retry a failed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the transfer after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the transfer.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry budget and backoff bounds for one run.
///
/// A policy with `max_retries = n` makes at most `n + 1` attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    /// Creates a policy with the default backoff schedule.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: INITIAL_BACKOFF,
            max_delay: MAX_BACKOFF,
        }
    }

    /// Overrides the backoff bounds. `max_delay` is raised to `initial_delay` if lower.
    #[must_use]
    pub fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay.max(initial_delay);
        self
    }

    /// Returns the number of retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the total number of attempts, first attempt included.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the delay to wait after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        scaled_delay(attempt, self.initial_delay, self.max_delay)
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt > self.max_retries {
            debug!(attempt, max_retries = self.max_retries, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retries exhausted after {attempt} attempt(s)"),
            };
        }

        let delay = self.delay_for(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let delays: Vec<u128> = (1..=8).map(|a| backoff_delay(a).as_millis()).collect();
        assert_eq!(delays, [500, 1000, 2000, 4000, 8000, 8000, 8000, 8000]);
    }

    #[test]
    fn test_backoff_delay_is_non_decreasing_for_large_attempts() {
        let mut previous = Duration::ZERO;
        for attempt in 1..200 {
            let delay = backoff_delay(attempt);
            assert!(delay >= previous);
            assert!(delay <= MAX_BACKOFF);
            previous = delay;
        }
        assert_eq!(backoff_delay(u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn test_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(1), INITIAL_BACKOFF);
    }

    #[test]
    fn test_should_retry_until_attempt_exceeds_budget() {
        let policy = RetryPolicy::new(2);

        assert_eq!(
            policy.should_retry(1),
            RetryDecision::Retry {
                delay: Duration::from_millis(500),
                attempt: 2
            }
        );
        assert_eq!(
            policy.should_retry(2),
            RetryDecision::Retry {
                delay: Duration::from_millis(1000),
                attempt: 3
            }
        );
        assert!(matches!(
            policy.should_retry(3),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0);
        assert_eq!(policy.max_attempts(), 1);
        assert!(matches!(
            policy.should_retry(1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_custom_backoff_bounds() {
        let policy =
            RetryPolicy::new(5).with_backoff(Duration::from_millis(10), Duration::from_millis(25));
        let delays: Vec<u128> = (1..=4).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(delays, [10, 20, 25, 25]);
    }

    #[test]
    fn test_custom_backoff_max_not_below_initial() {
        let policy =
            RetryPolicy::new(1).with_backoff(Duration::from_millis(50), Duration::from_millis(5));
        assert_eq!(policy.delay_for(3), Duration::from_millis(50));
    }
}
