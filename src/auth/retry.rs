//! Retry settings for token requests
//!
//! The issuer is occasionally down for tens of seconds, so requests are retried on a
//! fixed interval rather than an exponential schedule.

use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait between two consecutive attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(30))
    }
}

impl RetryConfig {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Single attempt, no waiting
    pub fn disabled() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Attempt count, never below one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
