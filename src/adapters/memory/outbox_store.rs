//! In-memory outbox store for testing.
//!
//! Follows the same contract as the PostgreSQL store, including duplicate
//! detection through the shared insert classifier, and lets tests inject
//! persistence failures.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use crate::domain::classifier::{classify_insert_failure, InsertFailure, PersistenceFailure};
use crate::domain::outbox::{
    validate_schema, NewOutboxEvent, OutboxError, OutboxEvent, OutboxState, DEFAULT_CLAIM_TIMEOUT,
};
use crate::ports::OutboxStore;

/// In-memory outbox store.
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned.
pub struct InMemoryOutboxStore {
    rows: RwLock<Vec<OutboxEvent>>,
    insert_failures: Mutex<VecDeque<PersistenceFailure>>,
    status_updates_fail: RwLock<bool>,
    claim_timeout: Duration,
}

impl Default for InMemoryOutboxStore {
    fn default() -> Self {
        Self {
            rows: RwLock::default(),
            insert_failures: Mutex::default(),
            status_updates_fail: RwLock::default(),
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands `processing` rows out again once their claim is this old.
    pub fn with_claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.claim_timeout = claim_timeout;
        self
    }

    // === Test Helpers ===

    /// Makes the next insert fail with the given database failure.
    pub fn fail_next_insert(&self, failure: PersistenceFailure) {
        self.insert_failures
            .lock()
            .expect("InMemoryOutboxStore: insert_failures lock poisoned")
            .push_back(failure);
    }

    /// Makes every status update report a persistence failure.
    pub fn set_status_updates_fail(&self, fail: bool) {
        *self
            .status_updates_fail
            .write()
            .expect("InMemoryOutboxStore: status flag lock poisoned") = fail;
    }

    /// Returns the row for a message id.
    pub fn get(&self, schema: &str, message_id: &str) -> Option<OutboxEvent> {
        self.rows
            .read()
            .expect("InMemoryOutboxStore: rows lock poisoned")
            .iter()
            .find(|row| row.schema == schema && row.message_id == message_id)
            .cloned()
    }

    /// Number of rows recorded for a message id (at most one).
    pub fn row_count(&self, schema: &str, message_id: &str) -> usize {
        self.rows
            .read()
            .expect("InMemoryOutboxStore: rows lock poisoned")
            .iter()
            .filter(|row| row.schema == schema && row.message_id == message_id)
            .count()
    }

    pub fn count_in_state(&self, schema: &str, state: OutboxState) -> usize {
        self.rows
            .read()
            .expect("InMemoryOutboxStore: rows lock poisoned")
            .iter()
            .filter(|row| row.schema == schema && row.state == state)
            .count()
    }

    pub fn len(&self) -> usize {
        self.rows
            .read()
            .expect("InMemoryOutboxStore: rows lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the row to `target` and applies `update`, if its current state
    /// allows it.
    fn transition(
        &self,
        message_id: &str,
        schema: &str,
        target: OutboxState,
        update: impl FnOnce(&mut OutboxEvent),
    ) -> bool {
        if *self
            .status_updates_fail
            .read()
            .expect("InMemoryOutboxStore: status flag lock poisoned")
        {
            tracing::warn!(message_id, schema, "Outbox status update failed: injected failure");
            return false;
        }

        let mut rows = self
            .rows
            .write()
            .expect("InMemoryOutboxStore: rows write lock poisoned");

        let now = Utc::now();
        match rows
            .iter_mut()
            .find(|row| row.schema == schema && row.message_id == message_id)
        {
            Some(row)
                if OutboxState::sources_of(target).contains(&row.state)
                    || (target == OutboxState::Processing
                        && row.is_claimable(now, self.claim_timeout)) =>
            {
                row.state = target;
                update(row);
                row.updated_at = now;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn insert_outbox(&self, event: &NewOutboxEvent) -> Result<bool, OutboxError> {
        validate_schema(&event.schema)?;

        let injected = self
            .insert_failures
            .lock()
            .expect("InMemoryOutboxStore: insert_failures lock poisoned")
            .pop_front();

        let mut rows = self
            .rows
            .write()
            .expect("InMemoryOutboxStore: rows write lock poisoned");

        let failure = injected.or_else(|| {
            rows.iter()
                .any(|row| row.schema == event.schema && row.message_id == event.message_id)
                .then(|| PersistenceFailure::duplicate_message_id(&event.message_id))
        });

        if let Some(failure) = failure {
            return match classify_insert_failure(&failure) {
                InsertFailure::Duplicate => Ok(false),
                InsertFailure::Other => Err(OutboxError::insert_failed(&failure.message)),
            };
        }

        rows.push(event.clone().into_event(Utc::now()));
        Ok(true)
    }

    async fn mark_as_processing(&self, message_id: &str, schema: &str) -> bool {
        self.transition(message_id, schema, OutboxState::Processing, |row| row.attempts += 1)
    }

    async fn mark_as_published(&self, message_id: &str, schema: &str) -> bool {
        self.transition(message_id, schema, OutboxState::Published, |_| {})
    }

    async fn mark_as_failed(&self, message_id: &str, schema: &str) -> bool {
        self.transition(message_id, schema, OutboxState::Failed, |_| {})
    }

    async fn mark_as_pending(
        &self,
        message_id: &str,
        schema: &str,
        error_message: Option<&str>,
    ) -> bool {
        let error_message = error_message.map(str::to_string);
        self.transition(message_id, schema, OutboxState::Pending, |row| {
            row.error_message = error_message
        })
    }

    async fn fetch_pending(
        &self,
        schema: &str,
        limit: u32,
    ) -> Result<Vec<OutboxEvent>, OutboxError> {
        validate_schema(schema)?;

        let now = Utc::now();
        let rows = self
            .rows
            .read()
            .expect("InMemoryOutboxStore: rows lock poisoned");

        Ok(rows
            .iter()
            .filter(|row| row.schema == schema && row.is_claimable(now, self.claim_timeout))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::PgErrorCode;
    use crate::domain::outbox::DEFAULT_SCHEMA;

    fn event(message_id: &str) -> NewOutboxEvent {
        NewOutboxEvent::new("orders", "order.placed", r#"{"total":10}"#, message_id)
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_message_id() {
        let store = InMemoryOutboxStore::new();

        assert!(store.insert_outbox(&event("M1")).await.unwrap());
        assert!(!store.insert_outbox(&event("M1")).await.unwrap());
        assert_eq!(store.row_count(DEFAULT_SCHEMA, "M1"), 1);
    }

    #[tokio::test]
    async fn same_message_id_in_other_schema_is_separate() {
        let store = InMemoryOutboxStore::new();

        assert!(store.insert_outbox(&event("M1")).await.unwrap());
        assert!(store
            .insert_outbox(&event("M1").with_schema("tenant_b"))
            .await
            .unwrap());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_does_not_overwrite() {
        let store = InMemoryOutboxStore::new();
        store.insert_outbox(&event("M1")).await.unwrap();

        let mut changed = event("M1");
        changed.payload = "different".to_string();
        store.insert_outbox(&changed).await.unwrap();

        assert_eq!(
            store.get(DEFAULT_SCHEMA, "M1").unwrap().payload,
            r#"{"total":10}"#
        );
    }

    #[tokio::test]
    async fn injected_non_duplicate_failure_is_an_error() {
        let store = InMemoryOutboxStore::new();
        store.fail_next_insert(
            PersistenceFailure::new("new row violates check constraint \"outbox_state_check\"")
                .with_code(PgErrorCode::CHECK_VIOLATION)
                .with_constraint("outbox_state_check"),
        );

        let err = store.insert_outbox(&event("M2")).await.unwrap_err();

        assert!(err
            .to_string()
            .starts_with("Failed to insert into outbox table: new row violates check constraint"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn injected_duplicate_failure_is_false() {
        let store = InMemoryOutboxStore::new();
        store.fail_next_insert(PersistenceFailure::duplicate_message_id("M3"));

        assert!(!store.insert_outbox(&event("M3")).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_schema_is_rejected() {
        let store = InMemoryOutboxStore::new();
        let err = store
            .insert_outbox(&event("M4").with_schema("x;y"))
            .await
            .unwrap_err();
        assert_eq!(err, OutboxError::InvalidSchema("x;y".to_string()));
    }

    #[tokio::test]
    async fn status_updates_follow_the_state_machine() {
        let store = InMemoryOutboxStore::new();
        store.insert_outbox(&event("M5")).await.unwrap();

        assert!(store.mark_as_processing("M5", DEFAULT_SCHEMA).await);
        assert!(store.mark_as_pending("M5", DEFAULT_SCHEMA, Some("broker down")).await);

        let row = store.get(DEFAULT_SCHEMA, "M5").unwrap();
        assert_eq!(row.state, OutboxState::Pending);
        assert_eq!(row.error_message.as_deref(), Some("broker down"));
        assert_eq!(row.attempts, 1);

        assert!(store.mark_as_processing("M5", DEFAULT_SCHEMA).await);
        assert!(store.mark_as_published("M5", DEFAULT_SCHEMA).await);

        assert!(!store.mark_as_failed("M5", DEFAULT_SCHEMA).await);
        assert!(!store.mark_as_pending("M5", DEFAULT_SCHEMA, None).await);
        assert_eq!(store.get(DEFAULT_SCHEMA, "M5").unwrap().state, OutboxState::Published);
    }

    #[tokio::test]
    async fn pending_error_message_is_nullable() {
        let store = InMemoryOutboxStore::new();
        store.insert_outbox(&event("M6")).await.unwrap();
        store.mark_as_pending("M6", DEFAULT_SCHEMA, Some("first")).await;

        assert!(store.mark_as_pending("M6", DEFAULT_SCHEMA, None).await);
        assert_eq!(store.get(DEFAULT_SCHEMA, "M6").unwrap().error_message, None);
    }

    #[tokio::test]
    async fn unknown_message_id_reports_false() {
        let store = InMemoryOutboxStore::new();
        assert!(!store.mark_as_published("nope", DEFAULT_SCHEMA).await);
        assert!(!store.mark_as_failed("nope", DEFAULT_SCHEMA).await);
        assert!(!store.mark_as_pending("nope", DEFAULT_SCHEMA, None).await);
    }

    #[tokio::test]
    async fn failing_status_updates_report_false() {
        let store = InMemoryOutboxStore::new();
        store.insert_outbox(&event("M7")).await.unwrap();
        store.set_status_updates_fail(true);

        assert!(!store.mark_as_published("M7", DEFAULT_SCHEMA).await);
        assert_eq!(store.get(DEFAULT_SCHEMA, "M7").unwrap().state, OutboxState::Pending);
    }

    #[tokio::test]
    async fn fetch_pending_is_ordered_and_limited() {
        let store = InMemoryOutboxStore::new();
        for id in ["a", "b", "c"] {
            store.insert_outbox(&event(id)).await.unwrap();
        }
        store.mark_as_published("a", DEFAULT_SCHEMA).await;

        let pending = store.fetch_pending(DEFAULT_SCHEMA, 1).await.unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message_id, "b");
    }

    #[tokio::test]
    async fn fresh_claims_are_not_handed_out_again() {
        let store = InMemoryOutboxStore::new();
        store.insert_outbox(&event("M8")).await.unwrap();
        assert!(store.mark_as_processing("M8", DEFAULT_SCHEMA).await);

        assert!(store.fetch_pending(DEFAULT_SCHEMA, 10).await.unwrap().is_empty());
        assert!(!store.mark_as_processing("M8", DEFAULT_SCHEMA).await);
    }

    #[tokio::test]
    async fn stale_claims_can_be_taken_again() {
        let store = InMemoryOutboxStore::new().with_claim_timeout(Duration::ZERO);
        store.insert_outbox(&event("M9")).await.unwrap();
        assert!(store.mark_as_processing("M9", DEFAULT_SCHEMA).await);

        let pending = store.fetch_pending(DEFAULT_SCHEMA, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].state, OutboxState::Processing);

        assert!(store.mark_as_processing("M9", DEFAULT_SCHEMA).await);
        assert_eq!(store.get(DEFAULT_SCHEMA, "M9").unwrap().attempts, 2);
    }
}
