//! Outbox database settings (`DB_BOX_*`).

use std::time::Duration;

use secrecy::Secret;

use super::resolver::ConfigResolver;
use crate::domain::outbox::{OutboxError, DEFAULT_CLAIM_TIMEOUT, DEFAULT_SCHEMA};

/// Prefix of every outbox database setting.
pub const DB_BOX_PREFIX: &str = "DB_BOX_";

pub const DB_BOX_HOST: &str = "DB_BOX_HOST";
pub const DB_BOX_PORT: &str = "DB_BOX_PORT";
pub const DB_BOX_NAME: &str = "DB_BOX_NAME";
pub const DB_BOX_USER: &str = "DB_BOX_USER";
pub const DB_BOX_PASS: &str = "DB_BOX_PASS";
pub const DB_BOX_SCHEMA: &str = "DB_BOX_SCHEMA";
pub const DB_BOX_MAX_CONNECTIONS: &str = "DB_BOX_MAX_CONNECTIONS";
pub const DB_BOX_CONNECT_TIMEOUT_SECS: &str = "DB_BOX_CONNECT_TIMEOUT_SECS";
pub const DB_BOX_CLAIM_TIMEOUT_SECS: &str = "DB_BOX_CLAIM_TIMEOUT_SECS";

/// Settings that must resolve before any connection attempt, in check order.
pub const REQUIRED_SETTINGS: [&str; 5] = [DB_BOX_HOST, DB_BOX_PORT, DB_BOX_NAME, DB_BOX_USER, DB_BOX_PASS];

/// Outbox database connection settings.
///
/// `port` stays raw text here; an unparseable port is a connection failure,
/// not a missing setting.
#[derive(Debug, Clone)]
pub struct OutboxDatabaseSettings {
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: Secret<String>,
    /// Schema used when a caller does not pass one
    pub schema: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    /// Age after which a `processing` row is handed out again
    pub claim_timeout: Duration,
}

impl OutboxDatabaseSettings {
    /// Reads settings, failing with every missing required name at once.
    pub fn from_resolver(resolver: &ConfigResolver) -> Result<Self, OutboxError> {
        let missing = resolver.missing(REQUIRED_SETTINGS);
        if !missing.is_empty() {
            return Err(OutboxError::missing_settings(missing));
        }

        let required = |name: &str| resolver.resolve(name).unwrap_or_default();

        Ok(Self {
            host: required(DB_BOX_HOST),
            port: required(DB_BOX_PORT),
            database: required(DB_BOX_NAME),
            user: required(DB_BOX_USER),
            password: Secret::new(required(DB_BOX_PASS)),
            schema: resolver
                .resolve(DB_BOX_SCHEMA)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            max_connections: resolver
                .resolve(DB_BOX_MAX_CONNECTIONS)
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_connections),
            connect_timeout: Duration::from_secs(
                resolver
                    .resolve(DB_BOX_CONNECT_TIMEOUT_SECS)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_connect_timeout),
            ),
            claim_timeout: resolver
                .resolve(DB_BOX_CLAIM_TIMEOUT_SECS)
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CLAIM_TIMEOUT),
        })
    }

    /// Parses the port, rejecting zero.
    pub fn parsed_port(&self) -> Result<u16, String> {
        match self.port.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(format!("invalid port '{}'", self.port)),
            Ok(port) => Ok(port),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    5
}
