//! Redis Streams transport.
//!
//! Appends each outbox event to a stream with `XADD`. Consumers read the
//! stream through consumer groups and deduplicate on `message_id`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{ErrorKind, RedisError};

use crate::config::BrokerSettings;
use crate::domain::classifier::TransportError;
use crate::ports::{MessageTransport, OutboundMessage};

/// Publishes outbox events to a Redis stream.
#[derive(Clone)]
pub struct RedisStreamTransport {
    conn: MultiplexedConnection,
    stream: String,
    max_len: Option<usize>,
}

impl RedisStreamTransport {
    /// Create a transport over an existing connection.
    pub fn new(conn: MultiplexedConnection, stream: impl Into<String>) -> Self {
        Self {
            conn,
            stream: stream.into(),
            max_len: None,
        }
    }

    /// Trim the stream to roughly `max_len` entries on every append.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Open a connection from broker settings.
    pub async fn connect(settings: &BrokerSettings) -> Result<Self, TransportError> {
        let client = redis::Client::open(settings.url.as_str()).map_err(transport_error)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(transport_error)?;

        let transport = Self::new(conn, settings.stream.clone());
        Ok(match settings.max_len {
            Some(max_len) => transport.with_max_len(max_len),
            None => transport,
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }
}

#[async_trait]
impl MessageTransport for RedisStreamTransport {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.stream);
        if let Some(max_len) = self.max_len {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }
        cmd.arg("*");
        for (field, value) in stream_fields(message) {
            cmd.arg(field).arg(value);
        }

        let mut conn = self.conn.clone();
        let entry_id: String = cmd.query_async(&mut conn).await.map_err(transport_error)?;

        tracing::debug!(
            message_id = %message.message_id,
            stream = %self.stream,
            entry_id = %entry_id,
            "Outbox event appended to stream"
        );
        Ok(())
    }
}

/// Field/value pairs of one stream entry. `partition_key` is omitted when
/// absent.
fn stream_fields(message: &OutboundMessage) -> Vec<(&'static str, &str)> {
    let mut fields = vec![
        ("message_id", message.message_id.as_str()),
        ("producer_service", message.producer_service.as_str()),
        ("event_type", message.event_type.as_str()),
    ];
    if let Some(key) = message.partition_key.as_deref() {
        fields.push(("partition_key", key));
    }
    fields.push(("payload", message.payload.as_str()));
    fields
}

fn transport_error(e: RedisError) -> TransportError {
    let message = e.to_string();

    if e.is_timeout() {
        return TransportError::Timeout(message);
    }
    if e.is_connection_refusal() || e.is_connection_dropped() {
        return TransportError::Connection(message);
    }

    match e.kind() {
        ErrorKind::IoError | ErrorKind::AuthenticationFailed => {
            TransportError::Connection(message)
        }
        ErrorKind::TypeError => TransportError::Encoding(message),
        ErrorKind::InvalidClientConfig => TransportError::Configuration(message),
        ErrorKind::ResponseError
        | ErrorKind::BusyLoadingError
        | ErrorKind::TryAgain
        | ErrorKind::ReadOnly => TransportError::Channel(message),
        _ => TransportError::Other(message),
    }
}
