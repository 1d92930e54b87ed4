//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(String),

    #[error("Batch size must be between 1 and 10000")]
    InvalidBatchSize,

    #[error("Poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("Retry policy needs at least one attempt")]
    InvalidMaxAttempts,

    #[error("Retry base delay exceeds max delay")]
    InvalidBackoff,

    #[error("Invalid outbox schema name: {0}")]
    InvalidSchema(String),

    #[error("Invalid broker URL format")]
    InvalidBrokerUrl,

    #[error("Invalid log format '{0}', expected 'pretty' or 'json'")]
    InvalidLogFormat(String),
}
