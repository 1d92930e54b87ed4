//! Application layer - the publish/retry protocol and the relay loop.
//!
//! - `publisher` - Delivers one event: attempts, classification, state updates
//! - `retry` - Attempt count, backoff and per-attempt deadline
//! - `metrics_emitter` - Outcome metrics that never fail delivery
//! - `relay` - Poll loop feeding pending events to the publisher

pub mod metrics_emitter;
pub mod publisher;
pub mod relay;
pub mod retry;

pub use metrics_emitter::MetricsEmitter;
pub use publisher::{DeliveryOutcome, Publisher};
pub use relay::{BatchReport, OutboxRelay, RelayConfig};
pub use retry::RetryPolicy;
