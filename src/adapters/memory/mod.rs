//! In-memory adapters for tests and local demos.
//!
//! - `InMemoryOutboxStore` - Outbox store with injectable persistence failures
//! - `InMemoryTransport` - Transport with a scripted failure queue
//! - `InMemoryMetricsSink` - Captures metrics for assertions

mod metrics_sink;
mod outbox_store;
mod transport;

pub use metrics_sink::InMemoryMetricsSink;
pub use outbox_store::InMemoryOutboxStore;
pub use transport::InMemoryTransport;
