//! Relay loop, retry policy and logging settings.

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::outbox::{validate_schema, DEFAULT_SCHEMA};

/// Relay poll loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// How often to poll for pending events, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum events delivered per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Outbox schema the relay drains
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl RelaySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidPollInterval);
        }
        if self.batch_size == 0 || self.batch_size > 10_000 {
            return Err(ValidationError::InvalidBatchSize);
        }
        validate_schema(&self.schema)
            .map_err(|_| ValidationError::InvalidSchema(self.schema.clone()))?;
        Ok(())
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            schema: default_schema(),
        }
    }
}

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// Delay grows by the base amount each retry.
    Linear,
    /// Delay doubles each retry.
    #[default]
    Exponential,
}

/// Retry policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Attempts per event, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Deadline for a single transport call; 0 disables it
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl RetrySettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ValidationError::InvalidBackoff);
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::default(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

/// Logging configuration for the relay binary
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LogSettings {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ValidationError::InvalidLogFormat(other.to_string())),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> u32 {
    100
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
