//! Redis adapters.
//!
//! - `RedisStreamTransport` - Publishes outbox events with `XADD`

mod stream_transport;

pub use stream_transport::RedisStreamTransport;
