//! Message broker settings (`BROKER_*`).

use super::error::ValidationError;
use super::resolver::ConfigResolver;

pub const BROKER_PREFIX: &str = "BROKER_";
pub const BROKER_URL: &str = "BROKER_URL";
pub const BROKER_STREAM: &str = "BROKER_STREAM";
pub const BROKER_MAX_LEN: &str = "BROKER_MAX_LEN";

/// Broker connection and stream settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Redis connection URL (redis:// or rediss://)
    pub url: String,

    /// Stream every outbox event is appended to
    pub stream: String,

    /// Approximate stream length cap (`MAXLEN ~`), none when unset
    pub max_len: Option<usize>,
}

impl BrokerSettings {
    pub fn from_resolver(resolver: &ConfigResolver) -> Result<Self, ValidationError> {
        let url = resolver
            .resolve(BROKER_URL)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ValidationError::MissingRequired(BROKER_URL.to_string()))?;

        let settings = Self {
            url,
            stream: resolver
                .resolve(BROKER_STREAM)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(default_stream),
            max_len: resolver.resolve(BROKER_MAX_LEN).and_then(|v| v.parse().ok()),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidBrokerUrl);
        }
        Ok(())
    }
}

fn default_stream() -> String {
    "outbox-events".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_required() {
        let resolver = ConfigResolver::new(BROKER_PREFIX);
        assert_eq!(
            BrokerSettings::from_resolver(&resolver),
            Err(ValidationError::MissingRequired(BROKER_URL.to_string()))
        );
    }

    #[test]
    fn stream_defaults() {
        let resolver =
            ConfigResolver::new(BROKER_PREFIX).with_overrides([(BROKER_URL, "redis://localhost:6379")]);
        let settings = BrokerSettings::from_resolver(&resolver).unwrap();

        assert_eq!(settings.stream, "outbox-events");
        assert_eq!(settings.max_len, None);
    }

    #[test]
    fn rejects_non_redis_url() {
        let resolver =
            ConfigResolver::new(BROKER_PREFIX).with_explicit([("url", "amqp://localhost:5672")]);
        assert_eq!(
            BrokerSettings::from_resolver(&resolver),
            Err(ValidationError::InvalidBrokerUrl)
        );
    }

    #[test]
    fn reads_stream_and_cap() {
        let resolver = ConfigResolver::new(BROKER_PREFIX).with_explicit([
            ("url", "rediss://broker:6380"),
            ("stream", "billing-events"),
            ("max_len", "10000"),
        ]);
        let settings = BrokerSettings::from_resolver(&resolver).unwrap();

        assert_eq!(settings.stream, "billing-events");
        assert_eq!(settings.max_len, Some(10000));
    }
}
