//! Delivery outcome metrics.
//!
//! Every terminal outcome is counted as `outbox.publish` tagged with
//! `exit_status` and `retry_status` (plus `error_type` on failure), and timed
//! as `outbox.publish.duration_ms`. A sink failure is logged and dropped; it
//! never changes the delivery outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::classifier::PublishErrorType;
use crate::domain::outbox::{ExitStatus, RetryStatus};
use crate::ports::{Metric, MetricKind, MetricsSink};

pub const PUBLISH_COUNTER: &str = "outbox.publish";
pub const PUBLISH_TIMER: &str = "outbox.publish.duration_ms";

pub const TAG_EXIT_STATUS: &str = "exit_status";
pub const TAG_RETRY_STATUS: &str = "retry_status";
pub const TAG_ERROR_TYPE: &str = "error_type";
pub const TAG_EVENT_TYPE: &str = "event_type";

/// Tags and forwards metrics to a sink without ever failing.
#[derive(Clone)]
pub struct MetricsEmitter {
    sink: Arc<dyn MetricsSink>,
}

impl MetricsEmitter {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    /// Forwards one metric. Sink errors are logged, not returned.
    pub fn emit(&self, name: &str, kind: MetricKind, value: f64, tags: BTreeMap<String, String>) {
        let metric = Metric {
            name: name.to_string(),
            kind,
            value,
            tags,
        };

        if let Err(e) = self.sink.emit(&metric) {
            tracing::warn!(metric = %metric.name, error = %e, "Dropping metric");
        }
    }

    /// Records the terminal outcome of a delivery campaign.
    pub fn publish_outcome(
        &self,
        event_type: &str,
        exit_status: ExitStatus,
        retry_status: RetryStatus,
        error_type: Option<PublishErrorType>,
        elapsed: Duration,
    ) {
        let mut tags = BTreeMap::new();
        tags.insert(TAG_EXIT_STATUS.to_string(), exit_status.to_string());
        tags.insert(TAG_RETRY_STATUS.to_string(), retry_status.to_string());
        tags.insert(TAG_EVENT_TYPE.to_string(), event_type.to_string());
        if let Some(error_type) = error_type {
            tags.insert(TAG_ERROR_TYPE.to_string(), error_type.to_string());
        }

        self.emit(PUBLISH_COUNTER, MetricKind::Counter, 1.0, tags.clone());
        self.emit(
            PUBLISH_TIMER,
            MetricKind::Timer,
            elapsed.as_secs_f64() * 1_000.0,
            tags,
        );
    }
}
