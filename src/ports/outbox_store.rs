//! OutboxStore port - Interface for the outbox system of record.
//!
//! ## Contract
//!
//! - `insert_outbox` is idempotent on `message_id`: `Ok(true)` when the row
//!   was created, `Ok(false)` when the id is already recorded, `Err` for any
//!   other failure.
//! - Status updates are best-effort. They return `false` instead of failing
//!   so the relay loop stays alive; the next poll re-observes the row.
//! - Implementations never delete rows.

use async_trait::async_trait;

use crate::domain::outbox::{NewOutboxEvent, OutboxError, OutboxEvent};

/// Port for persisting outbox events and advancing their delivery state.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Record a new event.
    async fn insert_outbox(&self, event: &NewOutboxEvent) -> Result<bool, OutboxError>;

    /// Claim an event for a delivery attempt and count the attempt.
    async fn mark_as_processing(&self, message_id: &str, schema: &str) -> bool;

    /// Record successful delivery.
    async fn mark_as_published(&self, message_id: &str, schema: &str) -> bool;

    /// Record terminal delivery failure.
    async fn mark_as_failed(&self, message_id: &str, schema: &str) -> bool;

    /// Re-queue an event after a retryable failure.
    async fn mark_as_pending(
        &self,
        message_id: &str,
        schema: &str,
        error_message: Option<&str>,
    ) -> bool;

    /// Pending events ordered by creation time, at most `limit`.
    async fn fetch_pending(&self, schema: &str, limit: u32)
        -> Result<Vec<OutboxEvent>, OutboxError>;
}
