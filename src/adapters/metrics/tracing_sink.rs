//! Metrics sink that writes each metric as a `tracing` event.
//!
//! Events use the `metrics` target so a subscriber can route them to a
//! separate layer or filter them out (`RUST_LOG=metrics=off`).

use crate::ports::{Metric, MetricsError, MetricsSink};

/// Emits metrics as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricsSink;

impl TracingMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsSink for TracingMetricsSink {
    fn emit(&self, metric: &Metric) -> Result<(), MetricsError> {
        tracing::info!(
            target: "metrics",
            metric = %metric.name,
            kind = %metric.kind,
            value = metric.value,
            tags = %format_tags(metric),
        );
        Ok(())
    }
}

/// `key=value` pairs in key order, comma separated.
fn format_tags(metric: &Metric) -> String {
    metric
        .tags
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
