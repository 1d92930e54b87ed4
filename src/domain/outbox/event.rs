//! The outbox row and the builder producers use to create one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::errors::OutboxError;
use super::state::OutboxState;

/// Schema used when the caller does not select one.
pub const DEFAULT_SCHEMA: &str = "public";

/// How long a `processing` claim holds before another poll may take the row.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(60);

/// Checks that a schema name is a plain SQL identifier.
///
/// Schema names are interpolated into statements (`"<schema>".outbox`), so
/// anything beyond `[A-Za-z_][A-Za-z0-9_]*` is refused.
pub fn validate_schema(schema: &str) -> Result<(), OutboxError> {
    let mut chars = schema.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid && schema.len() <= 63 {
        Ok(())
    } else {
        Err(OutboxError::InvalidSchema(schema.to_string()))
    }
}

/// An event recorded in the outbox table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Surrogate row id
    pub id: Uuid,

    /// Caller-supplied identity and idempotency key
    pub message_id: String,

    pub producer_service: String,

    pub event_type: String,

    /// Event body, never interpreted
    pub payload: String,

    /// Ordering hint passed through to the transport
    pub partition_key: Option<String>,

    pub schema: String,

    pub state: OutboxState,

    /// Last failure reason, set on re-queue
    pub error_message: Option<String>,

    /// Number of delivery attempts recorded against this row
    pub attempts: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl OutboxEvent {
    /// Returns true if a relay poll may take this row for delivery.
    ///
    /// Pending rows always qualify. A `processing` row qualifies once its
    /// claim is older than `claim_timeout`, so an attempt that died midway
    /// does not strand the event.
    pub fn is_claimable(&self, now: DateTime<Utc>, claim_timeout: Duration) -> bool {
        match self.state {
            state if state.is_deliverable() => true,
            OutboxState::Processing => chrono::Duration::from_std(claim_timeout)
                .ok()
                .and_then(|timeout| self.updated_at.checked_add_signed(timeout))
                .map_or(false, |expires| expires <= now),
            _ => false,
        }
    }
}

/// Insert request for the outbox.
///
/// # Example
///
/// ```
/// use event_outbox::domain::outbox::NewOutboxEvent;
///
/// let event = NewOutboxEvent::new("billing", "invoice.paid", r#"{"id":7}"#, "msg-7")
///     .with_partition_key("customer-42");
/// assert_eq!(event.schema, "public");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxEvent {
    pub producer_service: String,
    pub event_type: String,
    pub payload: String,
    pub message_id: String,
    pub partition_key: Option<String>,
    pub schema: String,
    pub initial_state: OutboxState,
}

impl NewOutboxEvent {
    /// Creates a pending event in the default schema.
    pub fn new(
        producer_service: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            producer_service: producer_service.into(),
            event_type: event_type.into(),
            payload: payload.into(),
            message_id: message_id.into(),
            partition_key: None,
            schema: DEFAULT_SCHEMA.to_string(),
            initial_state: OutboxState::Pending,
        }
    }

    /// Creates a pending event whose payload is `payload` serialized as JSON.
    pub fn from_json<T: Serialize>(
        producer_service: impl Into<String>,
        event_type: impl Into<String>,
        payload: &T,
        message_id: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_string(payload)?;
        Ok(Self::new(producer_service, event_type, payload, message_id))
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_state(mut self, state: OutboxState) -> Self {
        self.initial_state = state;
        self
    }

    /// Materializes the row this request would create.
    pub fn into_event(self, now: DateTime<Utc>) -> OutboxEvent {
        OutboxEvent {
            id: Uuid::new_v4(),
            message_id: self.message_id,
            producer_service: self.producer_service,
            event_type: self.event_type,
            payload: self.payload,
            partition_key: self.partition_key,
            schema: self.schema,
            state: self.initial_state,
            error_message: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_defaults_to_public_pending() {
        let event = NewOutboxEvent::new("svc", "thing.happened", "{}", "m-1");
        assert_eq!(event.schema, DEFAULT_SCHEMA);
        assert_eq!(event.initial_state, OutboxState::Pending);
        assert_eq!(event.partition_key, None);
    }

    #[test]
    fn builder_overrides_defaults() {
        let event = NewOutboxEvent::new("svc", "thing.happened", "{}", "m-1")
            .with_partition_key("p-1")
            .with_schema("tenant_a")
            .with_state(OutboxState::Processing);

        assert_eq!(event.partition_key.as_deref(), Some("p-1"));
        assert_eq!(event.schema, "tenant_a");
        assert_eq!(event.initial_state, OutboxState::Processing);
    }

    #[test]
    fn from_json_serializes_payload() {
        let event = NewOutboxEvent::from_json(
            "billing",
            "invoice.paid",
            &serde_json::json!({"invoice_id": "inv-1", "amount": 1200}),
            "m-2",
        )
        .unwrap();

        let body: serde_json::Value = serde_json::from_str(&event.payload).unwrap();
        assert_eq!(body["amount"], 1200);
    }

    #[test]
    fn into_event_starts_with_no_attempts() {
        let now = Utc::now();
        let row = NewOutboxEvent::new("svc", "t", "body", "m-9").into_event(now);

        assert_eq!(row.message_id, "m-9");
        assert_eq!(row.attempts, 0);
        assert_eq!(row.error_message, None);
        assert_eq!(row.created_at, now);
    }

    #[test]
    fn stale_processing_claims_are_claimable_again() {
        let claimed_at = Utc::now();
        let mut row = NewOutboxEvent::new("svc", "t", "body", "m-3").into_event(claimed_at);
        let timeout = Duration::from_secs(30);

        assert!(row.is_claimable(claimed_at, timeout));

        row.state = OutboxState::Processing;
        assert!(!row.is_claimable(claimed_at + chrono::Duration::seconds(29), timeout));
        assert!(row.is_claimable(claimed_at + chrono::Duration::seconds(30), timeout));

        row.state = OutboxState::Published;
        assert!(!row.is_claimable(claimed_at + chrono::Duration::hours(1), timeout));
    }

    #[test]
    fn schema_names_must_be_identifiers() {
        assert!(validate_schema("public").is_ok());
        assert!(validate_schema("_tenant_01").is_ok());
        assert!(validate_schema("").is_err());
        assert!(validate_schema("1tenant").is_err());
        assert!(validate_schema("public; DROP TABLE outbox").is_err());
        assert!(validate_schema("te\"nant").is_err());
        assert!(validate_schema(&"a".repeat(64)).is_err());
    }
}
