//! Retry policy for the publish protocol.
//!
//! How many attempts an event gets and how long to wait between them is
//! configuration of the relay, not something the protocol fixes.

use std::time::Duration;

use crate::config::{BackoffStrategy, RetrySettings};
use crate::domain::outbox::RetryStatus;

/// Attempts, backoff and per-attempt deadline for one delivery campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per event, including the first. Never zero.
    pub max_attempts: u32,

    /// Delay unit for the backoff strategy.
    pub base_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    pub backoff: BackoffStrategy,

    /// Deadline applied to each transport call.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff: settings.backoff,
            attempt_timeout: match settings.attempt_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately. Useful in tests and demos.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: BackoffStrategy::Fixed,
            attempt_timeout: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Tag for a 1-based attempt number.
    pub fn retry_status(&self, attempt: u32) -> RetryStatus {
        RetryStatus::for_attempt(attempt, self.max_attempts)
    }

    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt that follows `failed_attempt`.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let n = failed_attempt.max(1);
        let delay = match self.backoff {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay.saturating_mul(n),
            BackoffStrategy::Exponential => {
                let exponent = (n - 1).min(20);
                self.base_delay.saturating_mul(2_u32.saturating_pow(exponent))
            }
        };
        delay.min(self.max_delay)
    }
}
