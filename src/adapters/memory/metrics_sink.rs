//! In-memory metrics sink for testing.

use std::sync::Mutex;

use crate::ports::{Metric, MetricsError, MetricsSink};

/// Captures emitted metrics for assertions.
///
/// # Panics
///
/// Methods may panic if the internal lock is poisoned.
#[derive(Default)]
pub struct InMemoryMetricsSink {
    metrics: Mutex<Vec<Metric>>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Metric> {
        self.metrics
            .lock()
            .expect("InMemoryMetricsSink: lock poisoned")
            .clone()
    }

    /// Metrics with the given name, in emission order.
    pub fn named(&self, name: &str) -> Vec<Metric> {
        self.all().into_iter().filter(|m| m.name == name).collect()
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn emit(&self, metric: &Metric) -> Result<(), MetricsError> {
        self.metrics
            .lock()
            .expect("InMemoryMetricsSink: lock poisoned")
            .push(metric.clone());
        Ok(())
    }
}
