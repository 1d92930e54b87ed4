//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the outbox core and the outside world. Adapters implement these ports.
//!
//! - `OutboxStore` - System of record for outbox events and their state
//! - `MessageTransport` - Broker that receives published events
//! - `MetricsSink` - Backend receiving delivery outcome metrics

mod message_transport;
mod metrics_sink;
mod outbox_store;

pub use message_transport::{MessageTransport, OutboundMessage};
pub use metrics_sink::{Metric, MetricKind, MetricsError, MetricsSink};
pub use outbox_store::OutboxStore;
