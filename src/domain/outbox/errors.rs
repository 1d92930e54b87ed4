//! Error taxonomy for the outbox store.

use thiserror::Error;

/// Failures raised by outbox store operations.
///
/// A duplicate `message_id` on insert is not an error: the insert reports
/// `false` instead. Status updates never produce these; they return `bool`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboxError {
    /// One or more required settings are absent, listed in check order.
    #[error("Missing required configuration: {}", missing.join(", "))]
    Configuration { missing: Vec<String> },

    #[error("Failed to connect to event database: {0}")]
    Connection(String),

    /// Non-duplicate write failure. Carries the full message.
    #[error("{0}")]
    Persistence(String),

    #[error("Invalid outbox schema name '{0}'")]
    InvalidSchema(String),
}

impl OutboxError {
    pub fn missing_settings(missing: Vec<String>) -> Self {
        OutboxError::Configuration { missing }
    }

    pub fn insert_failed(cause: impl std::fmt::Display) -> Self {
        OutboxError::Persistence(format!("Failed to insert into outbox table: {}", cause))
    }

    pub fn fetch_failed(cause: impl std::fmt::Display) -> Self {
        OutboxError::Persistence(format!("Failed to fetch pending outbox events: {}", cause))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, OutboxError::Configuration { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, OutboxError::Connection(_))
    }
}
