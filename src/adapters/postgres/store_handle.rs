//! Caller-owned slot for the shared outbox store.
//!
//! Hands out one `PostgresOutboxStore` until `reset()`, after which the next
//! `instance()` builds a fresh store with no cached connection.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::{ConfigResolver, DB_BOX_PREFIX};

use super::outbox_store::PostgresOutboxStore;

pub struct OutboxStoreHandle {
    resolver: ConfigResolver,
    slot: Mutex<Option<Arc<PostgresOutboxStore>>>,
}

impl OutboxStoreHandle {
    pub fn new(resolver: ConfigResolver) -> Self {
        Self {
            resolver,
            slot: Mutex::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ConfigResolver::from_process(DB_BOX_PREFIX))
    }

    /// The current store, created on first call.
    pub async fn instance(&self) -> Arc<PostgresOutboxStore> {
        let mut slot = self.slot.lock().await;
        slot.get_or_insert_with(|| Arc::new(PostgresOutboxStore::new(self.resolver.clone())))
            .clone()
    }

    /// Discards the current store and closes its connection.
    pub async fn reset(&self) {
        let store = self.slot.lock().await.take();
        if let Some(store) = store {
            store.reset().await;
        }
    }
}
