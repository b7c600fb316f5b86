//! Retry policy as a pure decision function.
//!
//! The orchestrator's loop only executes decisions; whether a failure is
//! worth another attempt, and after what delay, is decided here and is
//! trivially testable without a clock or a network.

use std::time::Duration;

use super::LlmError;

/// Verdict for one failure: try again after a delay, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    Fail,
}

/// Bounded linear-backoff policy: up to `max_retries` additional attempts
/// after the first failure, the n-th retry waiting n × `base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::config::MAX_RETRIES,
            base_delay: Duration::from_millis(crate::config::RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after the `failures`-th consecutive failure
    /// (1-based). Non-retryable errors and an exhausted budget both fail.
    pub fn decide(&self, failures: u32, error: &LlmError) -> RetryDecision {
        if !error.is_retryable() || failures > self.max_retries {
            RetryDecision::Fail
        } else {
            RetryDecision::Retry(self.base_delay * failures)
        }
    }
}
