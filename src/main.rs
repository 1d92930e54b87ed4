//! Outbox relay binary
//!
//! Drains the PostgreSQL outbox into a Redis stream until Ctrl-C.
//!
//! Settings:
//! - `DB_BOX_*` - outbox database
//! - `BROKER_*` - Redis stream
//! - `OUTBOX_RELAY__*` - poll loop, retry policy, logging

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use event_outbox::adapters::{OutboxStoreHandle, RedisStreamTransport, TracingMetricsSink};
use event_outbox::application::{MetricsEmitter, OutboxRelay, Publisher, RelayConfig, RetryPolicy};
use event_outbox::config::{
    BrokerSettings, ConfigResolver, LogSettings, RelayAppConfig, BROKER_PREFIX, REQUIRED_SETTINGS,
};
use event_outbox::domain::outbox::DEFAULT_SCHEMA;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayAppConfig::load()?;
    config.validate()?;
    init_logging(&config.log);

    let handle = OutboxStoreHandle::from_env();
    let store = handle.instance().await;
    store.validate_required_env_vars(&REQUIRED_SETTINGS)?;

    let broker = BrokerSettings::from_resolver(&ConfigResolver::from_process(BROKER_PREFIX))?;
    let transport = RedisStreamTransport::connect(&broker).await?;
    tracing::info!(stream = %transport.stream(), "Connected to broker");

    let publisher = Publisher::with_policy(
        store.clone(),
        Arc::new(transport),
        MetricsEmitter::new(Arc::new(TracingMetricsSink::new())),
        RetryPolicy::from(&config.retry),
    );

    let mut relay_config = RelayConfig::from(&config.relay);
    if relay_config.schema == DEFAULT_SCHEMA {
        relay_config.schema = store.default_schema();
    }
    let relay = OutboxRelay::with_config(store, Arc::new(publisher), relay_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_task = tokio::spawn(async move { relay.run(shutdown_rx).await });

    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    let result = relay_task.await?;
    handle.reset().await;
    result?;

    Ok(())
}

fn init_logging(settings: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.is_json() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
