//! OutboxRelay - Background service that drains the outbox.
//!
//! Second half of the transactional outbox:
//! 1. Producers write events to the outbox (same transaction as domain changes)
//! 2. **The relay polls pending events and hands each to the Publisher** <- this module
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 1s | How often to check for pending events |
//! | `batch_size` | 100 | Max events delivered per poll cycle |
//! | `schema` | `public` | Outbox schema to drain |
//!
//! ## Graceful Shutdown
//!
//! The service listens for a shutdown signal and delivers one final batch
//! before stopping. Events are delivered one after another; there is no
//! ordering guarantee across events beyond creation order within a batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::config::RelaySettings;
use crate::domain::outbox::OutboxError;
use crate::ports::OutboxStore;

use super::publisher::Publisher;

/// Configuration for the OutboxRelay service.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How often to poll for pending events.
    pub poll_interval: Duration,

    /// Maximum events to process per poll cycle.
    pub batch_size: u32,

    /// Outbox schema to drain.
    pub schema: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from(&RelaySettings::default())
    }
}

impl From<&RelaySettings> for RelayConfig {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            batch_size: settings.batch_size,
            schema: settings.schema.clone(),
        }
    }
}

impl RelayConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}

/// Counts from one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub published: usize,
    pub failed: usize,
}

/// Polls the outbox and delivers pending events through a [`Publisher`].
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<Publisher>,
    config: RelayConfig,
}

impl OutboxRelay {
    /// Create a new OutboxRelay with default configuration.
    pub fn new(store: Arc<dyn OutboxStore>, publisher: Arc<Publisher>) -> Self {
        Self::with_config(store, publisher, RelayConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn OutboxStore>,
        publisher: Arc<Publisher>,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run the relay loop until shutdown signal is received.
    ///
    /// Poll failures are logged and retried on the next tick; only an
    /// invalid schema stops the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), OutboxError> {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tracing::info!(
            schema = %self.config.schema,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox relay started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.poll().await?;
                        tracing::info!("Outbox relay stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    self.poll().await?;
                }
            }
        }
    }

    async fn poll(&self) -> Result<(), OutboxError> {
        match self.process_batch().await {
            Ok(_) => Ok(()),
            Err(e @ OutboxError::InvalidSchema(_)) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Outbox poll failed");
                Ok(())
            }
        }
    }

    /// Process a single batch of pending events.
    pub async fn process_batch(&self) -> Result<BatchReport, OutboxError> {
        let events = self
            .store
            .fetch_pending(&self.config.schema, self.config.batch_size)
            .await?;

        let mut report = BatchReport {
            fetched: events.len(),
            ..Default::default()
        };

        for event in &events {
            if self.publisher.publish(event).await.is_success() {
                report.published += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.fetched > 0 {
            tracing::debug!(
                fetched = report.fetched,
                published = report.published,
                failed = report.failed,
                "Outbox batch processed"
            );
        }

        Ok(report)
    }

    /// Run exactly one poll cycle (for testing).
    pub async fn poll_once(&self) -> Result<BatchReport, OutboxError> {
        self.process_batch().await
    }
}
