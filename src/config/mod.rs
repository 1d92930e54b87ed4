//! Application configuration module
//!
//! Two layers:
//!
//! - [`ConfigResolver`] resolves flat prefixed settings (`DB_BOX_*` for the
//!   outbox database, `BROKER_*` for the transport) through an ordered chain
//!   of sources.
//! - [`RelayAppConfig`] loads the relay's typed settings with the `config` and
//!   `dotenvy` crates. Variables use the `OUTBOX_RELAY` prefix and double
//!   underscores for nesting.
//!
//! # Example
//!
//! ```no_run
//! use event_outbox::config::RelayAppConfig;
//!
//! let config = RelayAppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Draining schema {}", config.relay.schema);
//! ```

mod broker;
mod error;
mod outbox_database;
mod relay;
mod resolver;

pub use broker::{BrokerSettings, BROKER_MAX_LEN, BROKER_PREFIX, BROKER_STREAM, BROKER_URL};
pub use error::{ConfigError, ValidationError};
pub use outbox_database::{
    OutboxDatabaseSettings, DB_BOX_CLAIM_TIMEOUT_SECS, DB_BOX_CONNECT_TIMEOUT_SECS, DB_BOX_HOST, DB_BOX_MAX_CONNECTIONS,
    DB_BOX_NAME, DB_BOX_PASS, DB_BOX_PORT, DB_BOX_PREFIX, DB_BOX_SCHEMA, DB_BOX_USER,
    REQUIRED_SETTINGS,
};
pub use relay::{BackoffStrategy, LogSettings, RelaySettings, RetrySettings};
pub use resolver::{ConfigResolver, ConfigSource, EnvLookup};

use serde::Deserialize;

/// Root relay configuration
///
/// Every section has defaults, so an empty environment loads.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RelayAppConfig {
    /// Poll loop (interval, batch size, schema)
    #[serde(default)]
    pub relay: RelaySettings,

    /// Retry policy (attempts, backoff, per-attempt deadline)
    #[serde(default)]
    pub retry: RetrySettings,

    /// Logging (filter, output format)
    #[serde(default)]
    pub log: LogSettings,
}

impl RelayAppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `OUTBOX_RELAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `OUTBOX_RELAY__RELAY__BATCH_SIZE=50` -> `relay.batch_size = 50`
    /// - `OUTBOX_RELAY__RETRY__MAX_ATTEMPTS=5` -> `retry.max_attempts = 5`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("OUTBOX_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.relay.validate()?;
        self.retry.validate()?;
        self.log.validate()?;
        Ok(())
    }
}
