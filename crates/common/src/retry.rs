//! Bounded retry bookkeeping.
//!
//! Retries in gifnew are explicit state: an attempt counter checked against
//! a policy, plus a fixed delay the caller sleeps between attempts. Nothing
//! recurses, so the failure model can be inspected (and reset) at any time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many attempts an operation gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay between consecutive attempts, in milliseconds.
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Outcome of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the delay, then try again.
    RetryAfter(Duration),
    /// The attempt budget is spent.
    Exhausted,
}

/// Attempt counter bound to a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct AttemptCounter {
    policy: RetryPolicy,
    attempts: u32,
}

impl AttemptCounter {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Attempts made since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Whether another attempt is allowed.
    pub fn can_attempt(&self) -> bool {
        self.attempts < self.policy.max_attempts.max(1)
    }

    /// Mark the start of an attempt.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Record that the current attempt failed and decide what happens next.
    pub fn record_failure(&mut self) -> RetryDecision {
        if self.can_attempt() {
            RetryDecision::RetryAfter(self.policy.delay())
        } else {
            RetryDecision::Exhausted
        }
    }

    /// Reset the counter (manual retry action).
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_exhausts_after_budget() {
        let mut counter = AttemptCounter::new(RetryPolicy::new(3, 2000));
        for expected in 1..=2 {
            assert_eq!(counter.begin_attempt(), expected);
            assert_eq!(
                counter.record_failure(),
                RetryDecision::RetryAfter(Duration::from_secs(2))
            );
        }
        counter.begin_attempt();
        assert_eq!(counter.record_failure(), RetryDecision::Exhausted);
        assert!(!counter.can_attempt());
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut counter = AttemptCounter::new(RetryPolicy::new(1, 0));
        counter.begin_attempt();
        assert_eq!(counter.record_failure(), RetryDecision::Exhausted);
        counter.reset();
        assert_eq!(counter.attempts(), 0);
        assert!(counter.can_attempt());
    }

    #[test]
    fn test_zero_attempt_policy_still_allows_one_try() {
        let counter = AttemptCounter::new(RetryPolicy::new(0, 0));
        assert!(counter.can_attempt());
    }
}
