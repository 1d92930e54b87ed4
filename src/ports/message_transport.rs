//! MessageTransport port - Interface to the message broker.
//!
//! The relay hands each outbox event to a transport as an
//! [`OutboundMessage`]. The transport either accepts it or reports a
//! [`TransportError`], which the publisher classifies. Delivery is
//! at-least-once; receivers are expected to deduplicate on `message_id`.

use async_trait::async_trait;

use crate::domain::classifier::TransportError;
use crate::domain::outbox::OutboxEvent;

/// What goes over the wire for one outbox event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub message_id: String,
    pub producer_service: String,
    pub event_type: String,
    pub partition_key: Option<String>,
    pub payload: String,
}

impl From<&OutboxEvent> for OutboundMessage {
    fn from(event: &OutboxEvent) -> Self {
        Self {
            message_id: event.message_id.clone(),
            producer_service: event.producer_service.clone(),
            event_type: event.event_type.clone(),
            partition_key: event.partition_key.clone(),
            payload: event.payload.clone(),
        }
    }
}

/// Port for publishing one message to the broker.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}
