//! MetricsSink port - Interface to the metrics backend.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Kind of measurement being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    /// Duration in milliseconds
    Timer,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => f.write_str("counter"),
            MetricKind::Timer => f.write_str("timer"),
        }
    }
}

/// One tagged measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

impl Metric {
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Counter,
            value,
            tags: BTreeMap::new(),
        }
    }

    pub fn timer(name: impl Into<String>, millis: f64) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Timer,
            value: millis,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Sink rejected a metric.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Metrics sink unavailable: {0}")]
pub struct MetricsError(pub String);

/// Port for forwarding metrics to a backend.
///
/// Callers go through `MetricsEmitter`, which swallows sink errors.
pub trait MetricsSink: Send + Sync {
    fn emit(&self, metric: &Metric) -> Result<(), MetricsError>;
}
