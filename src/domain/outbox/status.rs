//! Outcome tags attached to delivery metrics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of a delivery campaign for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    Failed,
}

impl ExitStatus {
    pub const ALL: [ExitStatus; 2] = [ExitStatus::Success, ExitStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitStatus::Success => "success",
            ExitStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a delivery attempt within its retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStatus {
    First,
    Retry,
    Last,
}

impl RetryStatus {
    pub const ALL: [RetryStatus; 3] = [RetryStatus::First, RetryStatus::Retry, RetryStatus::Last];

    /// Tags a 1-based attempt number.
    ///
    /// The final allowed attempt is always `Last`, even when it is also the
    /// first one.
    pub fn for_attempt(attempt: u32, max_attempts: u32) -> Self {
        if attempt >= max_attempts {
            RetryStatus::Last
        } else if attempt <= 1 {
            RetryStatus::First
        } else {
            RetryStatus::Retry
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetryStatus::First => "first",
            RetryStatus::Retry => "retry",
            RetryStatus::Last => "last",
        }
    }
}

impl fmt::Display for RetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
