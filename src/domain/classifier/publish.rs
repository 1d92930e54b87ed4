//! Transport failure classification.
//!
//! Maps whatever the transport reported into the closed [`PublishErrorType`]
//! set used for retry decisions and metric tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Classified transport failure.
///
/// Used for retry decisions and metric tags only, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishErrorType {
    ConnectionError,
    ChannelError,
    Timeout,
    EncodingError,
    ConfigError,
    Unknown,
}

impl PublishErrorType {
    pub const ALL: [PublishErrorType; 6] = [
        PublishErrorType::ConnectionError,
        PublishErrorType::ChannelError,
        PublishErrorType::Timeout,
        PublishErrorType::EncodingError,
        PublishErrorType::ConfigError,
        PublishErrorType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishErrorType::ConnectionError => "connection_error",
            PublishErrorType::ChannelError => "channel_error",
            PublishErrorType::Timeout => "timeout",
            PublishErrorType::EncodingError => "encoding_error",
            PublishErrorType::ConfigError => "config_error",
            PublishErrorType::Unknown => "unknown",
        }
    }

    /// Whether another attempt can change the outcome.
    ///
    /// A payload that cannot be encoded or a transport that is misconfigured
    /// fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PublishErrorType::EncodingError | PublishErrorType::ConfigError
        )
    }
}

impl fmt::Display for PublishErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`MessageTransport`](crate::ports::MessageTransport).
///
/// Adapters map their client errors into the most specific variant they can;
/// `Io` and `Other` are classified from their kind and message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("I/O failure ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Channel failed: {0}")]
    Channel(String),

    #[error("Publish timed out: {0}")]
    Timeout(String),

    #[error("Payload encoding failed: {0}")]
    Encoding(String),

    #[error("Transport misconfigured: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Classifies a transport failure. Pure and deterministic.
pub fn classify(error: &TransportError) -> PublishErrorType {
    match error {
        TransportError::Io { kind, message } => classify_io_kind(*kind)
            .unwrap_or_else(|| classify_message(message)),
        TransportError::Connection(_) => PublishErrorType::ConnectionError,
        TransportError::Channel(_) => PublishErrorType::ChannelError,
        TransportError::Timeout(_) => PublishErrorType::Timeout,
        TransportError::Encoding(_) => PublishErrorType::EncodingError,
        TransportError::Configuration(_) => PublishErrorType::ConfigError,
        TransportError::Other(message) => classify_message(message),
    }
}

fn classify_io_kind(kind: io::ErrorKind) -> Option<PublishErrorType> {
    use io::ErrorKind::*;
    match kind {
        ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected | BrokenPipe
        | AddrNotAvailable => Some(PublishErrorType::ConnectionError),
        TimedOut => Some(PublishErrorType::Timeout),
        InvalidData => Some(PublishErrorType::EncodingError),
        _ => None,
    }
}

const TIMEOUT_PATTERNS: &[&str] = &["timed out", "timeout", "deadline exceeded"];
const CONNECTION_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection aborted",
    "connection closed",
    "broken pipe",
    "not connected",
    "econnrefused",
    "econnreset",
];
const CHANNEL_PATTERNS: &[&str] = &["channel", "protocol"];
const ENCODING_PATTERNS: &[&str] = &["serializ", "encod", "invalid utf-8", "invalid payload"];
const CONFIG_PATTERNS: &[&str] = &["config", "missing setting", "invalid url"];

/// Classifies an unstructured failure message.
///
/// Patterns are checked in the order timeout, connection, channel, encoding,
/// configuration, so "connection timed out" is a timeout.
pub fn classify_message(message: &str) -> PublishErrorType {
    let message = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

    if matches(TIMEOUT_PATTERNS) {
        PublishErrorType::Timeout
    } else if matches(CONNECTION_PATTERNS) {
        PublishErrorType::ConnectionError
    } else if matches(CHANNEL_PATTERNS) {
        PublishErrorType::ChannelError
    } else if matches(ENCODING_PATTERNS) {
        PublishErrorType::EncodingError
    } else if matches(CONFIG_PATTERNS) {
        PublishErrorType::ConfigError
    } else {
        PublishErrorType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_types_have_stable_names() {
        let names: Vec<_> = PublishErrorType::ALL.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "connection_error",
                "channel_error",
                "timeout",
                "encoding_error",
                "config_error",
                "unknown"
            ]
        );
    }

    #[test]
    fn only_encoding_and_config_are_final() {
        for error_type in PublishErrorType::ALL {
            let expected = !matches!(
                error_type,
                PublishErrorType::EncodingError | PublishErrorType::ConfigError
            );
            assert_eq!(error_type.is_retryable(), expected, "{}", error_type);
        }
    }

    #[test]
    fn typed_variants_map_directly() {
        assert_eq!(
            classify(&TransportError::Connection("down".into())),
            PublishErrorType::ConnectionError
        );
        assert_eq!(
            classify(&TransportError::Channel("closed by broker".into())),
            PublishErrorType::ChannelError
        );
        assert_eq!(
            classify(&TransportError::Timeout("5s".into())),
            PublishErrorType::Timeout
        );
        assert_eq!(
            classify(&TransportError::Encoding("bad json".into())),
            PublishErrorType::EncodingError
        );
        assert_eq!(
            classify(&TransportError::Configuration("no url".into())),
            PublishErrorType::ConfigError
        );
    }

    #[test]
    fn io_errors_classify_by_kind() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "nope");
        assert_eq!(
            classify(&TransportError::from(refused)),
            PublishErrorType::ConnectionError
        );

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "peer went away");
        assert_eq!(
            classify(&TransportError::from(reset)),
            PublishErrorType::ConnectionError
        );

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(classify(&TransportError::from(timed_out)), PublishErrorType::Timeout);
    }

    #[test]
    fn io_errors_of_other_kinds_fall_back_to_message() {
        let err = io::Error::new(io::ErrorKind::Other, "channel 3 closed");
        assert_eq!(classify(&TransportError::from(err)), PublishErrorType::ChannelError);
    }

    #[test]
    fn messages_classify_by_pattern() {
        assert_eq!(classify_message("Connection refused (os error 111)"), PublishErrorType::ConnectionError);
        assert_eq!(classify_message("connection timed out"), PublishErrorType::Timeout);
        assert_eq!(classify_message("PROTOCOL_ERROR from broker"), PublishErrorType::ChannelError);
        assert_eq!(classify_message("failed to serialize body"), PublishErrorType::EncodingError);
        assert_eq!(classify_message("missing setting BROKER_URL"), PublishErrorType::ConfigError);
        assert_eq!(classify_message("something odd happened"), PublishErrorType::Unknown);
    }

    #[test]
    fn unknown_messages_stay_unknown() {
        assert_eq!(
            classify(&TransportError::Other(String::new())),
            PublishErrorType::Unknown
        );
    }
}
