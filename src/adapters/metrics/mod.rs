//! Metrics adapters.
//!
//! - `TracingMetricsSink` - Writes metrics as structured log events

mod tracing_sink;

pub use tracing_sink::TracingMetricsSink;
