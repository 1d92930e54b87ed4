//! PostgreSQL adapters - Database implementations for the outbox port.
//!
//! - `PostgresOutboxStore` - Outbox table access with a lazily cached pool
//! - `OutboxStoreHandle` - Caller-owned slot sharing one store until reset

mod outbox_store;
mod store_handle;

pub use outbox_store::PostgresOutboxStore;
pub use store_handle::OutboxStoreHandle;
