//! Publisher - the publish/retry protocol for a single outbox event.
//!
//! ```text
//! attempt 1 (first) --ok--> published, success metric
//!     |
//!     +--retryable error, attempts left--> re-queue with error, back off
//!     |                                        |
//!     |                                        v
//!     |                              attempt n (retry | last) --> ...
//!     |
//!     +--final error or attempts exhausted--> failed, failure metric
//! ```
//!
//! Exactly one terminal state (published or failed) is recorded per
//! campaign. Between attempts the row sits in `pending` with its error
//! message, so any relay poll can pick it up again if this process dies.
//! A campaign dropped mid-attempt leaves the row `processing`; the store
//! hands it out again once the claim timeout passes.

use std::sync::Arc;
use std::time::Instant;

use crate::domain::classifier::{classify, PublishErrorType, TransportError};
use crate::domain::outbox::{ExitStatus, OutboxEvent, RetryStatus};
use crate::ports::{MessageTransport, OutboundMessage, OutboxStore};

use super::metrics_emitter::MetricsEmitter;
use super::retry::RetryPolicy;

/// Result of one delivery campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub message_id: String,
    pub exit_status: ExitStatus,
    /// Tag of the attempt that ended the campaign
    pub retry_status: RetryStatus,
    pub attempts: u32,
    /// Classification of the final failure, none on success
    pub error_type: Option<PublishErrorType>,
    pub last_error: Option<String>,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_status == ExitStatus::Success
    }
}

/// Drives delivery attempts for outbox events.
pub struct Publisher {
    store: Arc<dyn OutboxStore>,
    transport: Arc<dyn MessageTransport>,
    metrics: MetricsEmitter,
    policy: RetryPolicy,
}

impl Publisher {
    /// Create a publisher with the default retry policy.
    pub fn new(
        store: Arc<dyn OutboxStore>,
        transport: Arc<dyn MessageTransport>,
        metrics: MetricsEmitter,
    ) -> Self {
        Self::with_policy(store, transport, metrics, RetryPolicy::default())
    }

    pub fn with_policy(
        store: Arc<dyn OutboxStore>,
        transport: Arc<dyn MessageTransport>,
        metrics: MetricsEmitter,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            metrics,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver one event, retrying per policy, and record the outcome.
    ///
    /// Never fails: persistence problems while updating status are logged
    /// and left for the next poll to observe.
    pub async fn publish(&self, event: &OutboxEvent) -> DeliveryOutcome {
        let started = Instant::now();
        let message = OutboundMessage::from(event);
        let mut attempt = 1;

        loop {
            let retry_status = self.policy.retry_status(attempt);

            if !self
                .store
                .mark_as_processing(&event.message_id, &event.schema)
                .await
            {
                tracing::debug!(
                    message_id = %event.message_id,
                    attempt,
                    "Outbox event not claimed, attempting delivery anyway"
                );
            }

            let error = match self.attempt(&message).await {
                Ok(()) => {
                    if !self
                        .store
                        .mark_as_published(&event.message_id, &event.schema)
                        .await
                    {
                        tracing::warn!(
                            message_id = %event.message_id,
                            "Event delivered but published status was not recorded"
                        );
                    }

                    tracing::info!(
                        message_id = %event.message_id,
                        event_type = %event.event_type,
                        attempt,
                        retry_status = %retry_status,
                        "Published outbox event"
                    );
                    self.metrics.publish_outcome(
                        &event.event_type,
                        ExitStatus::Success,
                        retry_status,
                        None,
                        started.elapsed(),
                    );

                    return DeliveryOutcome {
                        message_id: event.message_id.clone(),
                        exit_status: ExitStatus::Success,
                        retry_status,
                        attempts: attempt,
                        error_type: None,
                        last_error: None,
                    };
                }
                Err(error) => error,
            };

            let error_type = classify(&error);
            let error_message = error.to_string();

            if error_type.is_retryable() && self.policy.has_attempts_after(attempt) {
                tracing::warn!(
                    message_id = %event.message_id,
                    attempt,
                    retry_status = %retry_status,
                    error_type = %error_type,
                    error = %error_message,
                    "Publish attempt failed, re-queueing"
                );

                if !self
                    .store
                    .mark_as_pending(&event.message_id, &event.schema, Some(&error_message))
                    .await
                {
                    tracing::warn!(
                        message_id = %event.message_id,
                        "Re-queue status was not recorded"
                    );
                }

                tokio::time::sleep(self.policy.delay_after(attempt)).await;
                attempt += 1;
                continue;
            }

            tracing::error!(
                message_id = %event.message_id,
                event_type = %event.event_type,
                attempt,
                retry_status = %retry_status,
                error_type = %error_type,
                error = %error_message,
                "Giving up on outbox event"
            );

            if !self
                .store
                .mark_as_failed(&event.message_id, &event.schema)
                .await
            {
                tracing::warn!(
                    message_id = %event.message_id,
                    "Failed status was not recorded"
                );
            }

            self.metrics.publish_outcome(
                &event.event_type,
                ExitStatus::Failed,
                retry_status,
                Some(error_type),
                started.elapsed(),
            );

            return DeliveryOutcome {
                message_id: event.message_id.clone(),
                exit_status: ExitStatus::Failed,
                retry_status,
                attempts: attempt,
                error_type: Some(error_type),
                last_error: Some(error_message),
            };
        }
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        match self.policy.attempt_timeout {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.transport.publish(message)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(format!(
                        "no broker response within {}ms",
                        deadline.as_millis()
                    ))),
                }
            }
            None => self.transport.publish(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryMetricsSink, InMemoryOutboxStore, InMemoryTransport};
    use crate::application::metrics_emitter::{
        PUBLISH_COUNTER, TAG_ERROR_TYPE, TAG_EXIT_STATUS, TAG_RETRY_STATUS,
    };
    use crate::domain::outbox::{NewOutboxEvent, OutboxState, DEFAULT_SCHEMA};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Harness {
        store: Arc<InMemoryOutboxStore>,
        transport: Arc<InMemoryTransport>,
        sink: Arc<InMemoryMetricsSink>,
        publisher: Publisher,
    }

    fn harness(policy: RetryPolicy) -> Harness {
        let store = Arc::new(InMemoryOutboxStore::new());
        let transport = Arc::new(InMemoryTransport::new());
        let sink = Arc::new(InMemoryMetricsSink::new());
        let publisher = Publisher::with_policy(
            store.clone(),
            transport.clone(),
            MetricsEmitter::new(sink.clone()),
            policy,
        );
        Harness {
            store,
            transport,
            sink,
            publisher,
        }
    }

    async fn seed(store: &InMemoryOutboxStore, message_id: &str) -> OutboxEvent {
        let new = NewOutboxEvent::new("orders", "order.placed", "{}", message_id);
        assert!(store.insert_outbox(&new).await.unwrap());
        store.get(DEFAULT_SCHEMA, message_id).unwrap()
    }

    #[tokio::test]
    async fn first_attempt_success_is_tagged_first() {
        let h = harness(RetryPolicy::immediate(3));
        let event = seed(&h.store, "m-1").await;

        let outcome = h.publisher.publish(&event).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.retry_status, RetryStatus::First);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(h.transport.published().len(), 1);
        assert_eq!(h.store.get(DEFAULT_SCHEMA, "m-1").unwrap().state, OutboxState::Published);

        let counter = &h.sink.named(PUBLISH_COUNTER)[0];
        assert_eq!(counter.tag(TAG_EXIT_STATUS), Some("success"));
        assert_eq!(counter.tag(TAG_RETRY_STATUS), Some("first"));
    }

    #[tokio::test]
    async fn retryable_failure_requeues_then_succeeds() {
        let h = harness(RetryPolicy::immediate(3));
        let event = seed(&h.store, "m-2").await;
        h.transport
            .fail_next(TransportError::Connection("connection refused".into()));

        let outcome = h.publisher.publish(&event).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.retry_status, RetryStatus::Retry);
        assert_eq!(outcome.attempts, 2);

        let row = h.store.get(DEFAULT_SCHEMA, "m-2").unwrap();
        assert_eq!(row.state, OutboxState::Published);
        assert_eq!(row.attempts, 2);
        assert_eq!(
            row.error_message.as_deref(),
            Some("Connection failed: connection refused")
        );

        let counters = h.sink.named(PUBLISH_COUNTER);
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].tag(TAG_RETRY_STATUS), Some("retry"));
    }

    #[tokio::test]
    async fn exhausted_attempts_fail_with_last() {
        let h = harness(RetryPolicy::immediate(3));
        let event = seed(&h.store, "m-3").await;
        for _ in 0..3 {
            h.transport.fail_next(TransportError::Timeout("5s".into()));
        }

        let outcome = h.publisher.publish(&event).await;

        assert_eq!(outcome.exit_status, ExitStatus::Failed);
        assert_eq!(outcome.retry_status, RetryStatus::Last);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.error_type, Some(PublishErrorType::Timeout));
        assert_eq!(h.store.get(DEFAULT_SCHEMA, "m-3").unwrap().state, OutboxState::Failed);

        let counters = h.sink.named(PUBLISH_COUNTER);
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].tag(TAG_EXIT_STATUS), Some("failed"));
        assert_eq!(counters[0].tag(TAG_RETRY_STATUS), Some("last"));
        assert_eq!(counters[0].tag(TAG_ERROR_TYPE), Some("timeout"));
    }

    #[tokio::test]
    async fn non_retryable_failure_stops_immediately() {
        let h = harness(RetryPolicy::immediate(5));
        let event = seed(&h.store, "m-4").await;
        h.transport
            .fail_next(TransportError::Encoding("payload is not valid UTF-8".into()));

        let outcome = h.publisher.publish(&event).await;

        assert_eq!(outcome.exit_status, ExitStatus::Failed);
        assert_eq!(outcome.retry_status, RetryStatus::First);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error_type, Some(PublishErrorType::EncodingError));
        assert_eq!(h.store.get(DEFAULT_SCHEMA, "m-4").unwrap().state, OutboxState::Failed);
        assert!(h.transport.published().is_empty());
    }

    #[tokio::test]
    async fn non_retryable_on_a_retry_is_tagged_retry() {
        let h = harness(RetryPolicy::immediate(4));
        let event = seed(&h.store, "m-5").await;
        h.transport.fail_next(TransportError::Channel("channel closed".into()));
        h.transport
            .fail_next(TransportError::Configuration("exchange missing".into()));

        let outcome = h.publisher.publish(&event).await;

        assert_eq!(outcome.exit_status, ExitStatus::Failed);
        assert_eq!(outcome.retry_status, RetryStatus::Retry);
        assert_eq!(outcome.error_type, Some(PublishErrorType::ConfigError));
    }

    #[tokio::test]
    async fn single_attempt_policy_success_is_tagged_last() {
        let h = harness(RetryPolicy::immediate(1));
        let event = seed(&h.store, "m-6").await;

        let outcome = h.publisher.publish(&event).await;

        assert_eq!(outcome.retry_status, RetryStatus::Last);
    }

    struct HangingTransport;

    #[async_trait]
    impl MessageTransport for HangingTransport {
        async fn publish(&self, _: &OutboundMessage) -> Result<(), TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_transport_is_classified_as_timeout() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let sink = Arc::new(InMemoryMetricsSink::new());
        let publisher = Publisher::with_policy(
            store.clone(),
            Arc::new(HangingTransport),
            MetricsEmitter::new(sink.clone()),
            RetryPolicy::immediate(2).with_attempt_timeout(Duration::from_secs(1)),
        );
        let event = seed(&store, "m-7").await;

        let outcome = publisher.publish(&event).await;

        assert_eq!(outcome.exit_status, ExitStatus::Failed);
        assert_eq!(outcome.retry_status, RetryStatus::Last);
        assert_eq!(outcome.error_type, Some(PublishErrorType::Timeout));
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff: crate::config::BackoffStrategy::Exponential,
            attempt_timeout: None,
        };
        let h = harness(policy);
        let event = seed(&h.store, "m-8").await;
        h.transport.fail_next(TransportError::Other("boom".into()));
        h.transport.fail_next(TransportError::Other("boom".into()));

        let started = tokio::time::Instant::now();
        let outcome = h.publisher.publish(&event).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.retry_status, RetryStatus::Last);
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn lost_status_update_does_not_change_outcome() {
        let h = harness(RetryPolicy::immediate(2));
        // Never inserted, so every status update reports false.
        let ghost = NewOutboxEvent::new("orders", "order.placed", "{}", "ghost")
            .into_event(chrono::Utc::now());

        let outcome = h.publisher.publish(&ghost).await;

        assert!(outcome.is_success());
        assert_eq!(h.transport.published().len(), 1);
    }
}
