//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - In-memory store, transport and metrics sink for tests
//! - `metrics` - Metrics sink backed by `tracing`
//! - `postgres` - PostgreSQL outbox store and its caller-owned handle
//! - `redis` - Redis Streams transport

pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod redis;

pub use memory::{InMemoryMetricsSink, InMemoryOutboxStore, InMemoryTransport};
pub use metrics::TracingMetricsSink;
pub use postgres::{OutboxStoreHandle, PostgresOutboxStore};
pub use self::redis::RedisStreamTransport;
