//! In-memory transport for testing.
//!
//! Captures published messages and replays a scripted queue of failures,
//! one per publish call, before succeeding.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::classifier::TransportError;
use crate::ports::{MessageTransport, OutboundMessage};

/// Scripted in-memory transport.
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned.
#[derive(Default)]
pub struct InMemoryTransport {
    failures: Mutex<VecDeque<TransportError>>,
    published: Mutex<Vec<OutboundMessage>>,
    calls: Mutex<usize>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure for the next publish call.
    pub fn fail_next(&self, error: TransportError) {
        self.failures
            .lock()
            .expect("InMemoryTransport: failures lock poisoned")
            .push_back(error);
    }

    /// Messages accepted so far.
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published
            .lock()
            .expect("InMemoryTransport: published lock poisoned")
            .clone()
    }

    /// Publish calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        *self
            .calls
            .lock()
            .expect("InMemoryTransport: calls lock poisoned")
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        *self
            .calls
            .lock()
            .expect("InMemoryTransport: calls lock poisoned") += 1;

        if let Some(error) = self
            .failures
            .lock()
            .expect("InMemoryTransport: failures lock poisoned")
            .pop_front()
        {
            return Err(error);
        }

        self.published
            .lock()
            .expect("InMemoryTransport: published lock poisoned")
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> OutboundMessage {
        OutboundMessage {
            message_id: "m-1".to_string(),
            producer_service: "orders".to_string(),
            event_type: "order.placed".to_string(),
            partition_key: None,
            payload: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn replays_failures_then_succeeds() {
        let transport = InMemoryTransport::new();
        transport.fail_next(TransportError::Channel("closed".into()));

        assert!(transport.publish(&message()).await.is_err());
        assert!(transport.publish(&message()).await.is_ok());
        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.published().len(), 1);
    }
}
