//! PostgreSQL implementation of OutboxStore.
//!
//! Connection settings come from `DB_BOX_*` through a [`ConfigResolver`].
//! Every operation re-checks that all required settings resolve before it
//! looks at its arguments or touches the database; the pool itself is created
//! on first use and cached only once a connection succeeds.
//!
//! A `processing` row whose `updated_at` is older than the claim timeout
//! (`DB_BOX_CLAIM_TIMEOUT_SECS`) counts as abandoned: `fetch_pending` returns
//! it and `mark_as_processing` may claim it again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{ConfigResolver, OutboxDatabaseSettings, DB_BOX_PREFIX, DB_BOX_SCHEMA};
use crate::domain::classifier::{classify_insert_failure, InsertFailure, PersistenceFailure};
use crate::domain::outbox::{
    validate_schema, NewOutboxEvent, OutboxError, OutboxEvent, OutboxState, DEFAULT_SCHEMA,
};
use crate::ports::OutboxStore;

/// PostgreSQL implementation of OutboxStore.
pub struct PostgresOutboxStore {
    resolver: ConfigResolver,
    pool: Mutex<Option<PgPool>>,
}

impl PostgresOutboxStore {
    /// Creates a store that resolves its settings through `resolver`.
    pub fn new(resolver: ConfigResolver) -> Self {
        Self {
            resolver,
            pool: Mutex::new(None),
        }
    }

    /// Creates a store over the process environment.
    pub fn from_env() -> Self {
        Self::new(ConfigResolver::from_process(DB_BOX_PREFIX))
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Schema named by `DB_BOX_SCHEMA`, or `public`.
    pub fn default_schema(&self) -> String {
        self.resolver
            .resolve(DB_BOX_SCHEMA)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SCHEMA.to_string())
    }

    /// Fails listing every name in `names` that does not resolve.
    ///
    /// Each name is reported once, in the order given. An empty list passes.
    pub fn validate_required_env_vars(&self, names: &[&str]) -> Result<(), OutboxError> {
        let missing = self.resolver.missing(names.iter().copied());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(OutboxError::missing_settings(missing))
        }
    }

    /// Returns the cached pool, connecting first if there is none.
    ///
    /// Settings are validated on every call, cached pool or not. A failed
    /// connection attempt leaves the cache empty.
    pub async fn get_connection(&self) -> Result<PgPool, OutboxError> {
        let settings = OutboxDatabaseSettings::from_resolver(&self.resolver)?;
        self.pool_for(&settings).await
    }

    async fn pool_for(&self, settings: &OutboxDatabaseSettings) -> Result<PgPool, OutboxError> {
        let mut cached = self.pool.lock().await;
        if let Some(pool) = cached.as_ref() {
            return Ok(pool.clone());
        }

        let pool = connect(settings).await?;
        tracing::info!(
            host = %settings.host,
            database = %settings.database,
            max_connections = settings.max_connections,
            "Connected to event database"
        );

        *cached = Some(pool.clone());
        Ok(pool)
    }

    /// Closes and discards the cached pool.
    pub async fn reset(&self) {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::debug!("Event database connection closed");
        }
    }

    pub async fn has_cached_connection(&self) -> bool {
        self.pool.lock().await.is_some()
    }

    /// Resolves settings, then checks the schema name.
    fn settings_for(&self, schema: &str) -> Result<OutboxDatabaseSettings, OutboxError> {
        let settings = OutboxDatabaseSettings::from_resolver(&self.resolver)?;
        validate_schema(schema)?;
        Ok(settings)
    }

    /// Runs a guarded status update, reporting failures as `false`.
    async fn update_status(
        &self,
        message_id: &str,
        schema: &str,
        target: OutboxState,
        error_message: Option<&str>,
    ) -> bool {
        let settings = match self.settings_for(schema) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(message_id, schema, target = %target, error = %e, "Outbox status update rejected");
                return false;
            }
        };

        let pool = match self.pool_for(&settings).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(message_id, schema, target = %target, error = %e, "Outbox status update failed");
                return false;
            }
        };

        let sql = status_update_sql(schema, target);
        let mut query = sqlx::query(&sql).bind(message_id);
        match target {
            OutboxState::Pending => query = query.bind(error_message),
            OutboxState::Processing => query = query.bind(settings.claim_timeout.as_secs_f64()),
            OutboxState::Published | OutboxState::Failed => {}
        }

        match query.execute(&pool).await {
            Ok(result) if result.rows_affected() > 0 => true,
            Ok(_) => {
                tracing::debug!(message_id, schema, target = %target, "No outbox row eligible for status update");
                false
            }
            Err(e) => {
                tracing::warn!(message_id, schema, target = %target, error = %e, "Outbox status update failed");
                false
            }
        }
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn insert_outbox(&self, event: &NewOutboxEvent) -> Result<bool, OutboxError> {
        let settings = self.settings_for(&event.schema)?;
        let pool = self.pool_for(&settings).await?;

        let sql = format!(
            r#"
            INSERT INTO {} (
                id, message_id, producer_service, event_type, payload,
                partition_key, state, attempts, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $8)
            "#,
            qualified_table(&event.schema)
        );

        let result = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&event.message_id)
            .bind(&event.producer_service)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.partition_key.as_deref())
            .bind(event.initial_state.as_str())
            .bind(Utc::now())
            .execute(&pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => match classify_insert_failure(&persistence_failure(&e)) {
                InsertFailure::Duplicate => {
                    tracing::debug!(
                        message_id = %event.message_id,
                        schema = %event.schema,
                        "Outbox event already recorded"
                    );
                    Ok(false)
                }
                InsertFailure::Other => Err(OutboxError::insert_failed(e)),
            },
        }
    }

    async fn mark_as_processing(&self, message_id: &str, schema: &str) -> bool {
        self.update_status(message_id, schema, OutboxState::Processing, None)
            .await
    }

    async fn mark_as_published(&self, message_id: &str, schema: &str) -> bool {
        self.update_status(message_id, schema, OutboxState::Published, None)
            .await
    }

    async fn mark_as_failed(&self, message_id: &str, schema: &str) -> bool {
        self.update_status(message_id, schema, OutboxState::Failed, None)
            .await
    }

    async fn mark_as_pending(
        &self,
        message_id: &str,
        schema: &str,
        error_message: Option<&str>,
    ) -> bool {
        self.update_status(message_id, schema, OutboxState::Pending, error_message)
            .await
    }

    async fn fetch_pending(
        &self,
        schema: &str,
        limit: u32,
    ) -> Result<Vec<OutboxEvent>, OutboxError> {
        let settings = self.settings_for(schema)?;
        let pool = self.pool_for(&settings).await?;

        let sql = format!(
            r#"
            SELECT id, message_id, producer_service, event_type, payload,
                   partition_key, state, error_message, attempts,
                   created_at, updated_at
            FROM {}
            WHERE state = 'pending' OR {}
            ORDER BY created_at ASC
            LIMIT $1
            "#,
            qualified_table(schema),
            STALE_CLAIM
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .bind(settings.claim_timeout.as_secs_f64())
            .fetch_all(&pool)
            .await
            .map_err(OutboxError::fetch_failed)?;

        rows.iter().map(|row| row_to_event(row, schema)).collect()
    }
}

async fn connect(settings: &OutboxDatabaseSettings) -> Result<PgPool, OutboxError> {
    let port = settings.parsed_port().map_err(OutboxError::Connection)?;

    if settings.host.trim().is_empty() {
        return Err(OutboxError::Connection("empty host".to_string()));
    }
    if settings.user.is_empty() || settings.password.expose_secret().is_empty() {
        return Err(OutboxError::Connection("empty credentials".to_string()));
    }

    let options = PgConnectOptions::new()
        .host(&settings.host)
        .port(port)
        .database(&settings.database)
        .username(&settings.user)
        .password(settings.password.expose_secret());

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.connect_timeout)
        .connect_with(options)
        .await
        .map_err(|e| OutboxError::Connection(e.to_string()))
}

/// Matches a `processing` row whose claim is older than `$2` seconds.
const STALE_CLAIM: &str =
    "(state = 'processing' AND updated_at <= NOW() - make_interval(secs => $2))";

fn qualified_table(schema: &str) -> String {
    format!("\"{}\".outbox", schema)
}

fn status_update_sql(schema: &str, target: OutboxState) -> String {
    let sources = OutboxState::sources_of(target)
        .iter()
        .map(|state| format!("'{}'", state.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let assignments = match target {
        OutboxState::Processing => "state = 'processing', attempts = attempts + 1",
        OutboxState::Pending => "state = 'pending', error_message = $2",
        OutboxState::Published => "state = 'published'",
        OutboxState::Failed => "state = 'failed'",
    };

    let guard = match target {
        OutboxState::Processing => format!("(state IN ({}) OR {})", sources, STALE_CLAIM),
        _ => format!("state IN ({})", sources),
    };

    format!(
        "UPDATE {} SET {}, updated_at = NOW() WHERE message_id = $1 AND {}",
        qualified_table(schema),
        assignments,
        guard
    )
}

/// Extracts SQLSTATE, constraint and message from a sqlx error.
fn persistence_failure(error: &sqlx::Error) -> PersistenceFailure {
    match error {
        sqlx::Error::Database(db) => {
            let mut failure = PersistenceFailure::new(db.message());
            if let Some(code) = db.code() {
                failure = failure.with_code(code.into_owned());
            }
            if let Some(constraint) = db.constraint() {
                failure = failure.with_constraint(constraint);
            }
            failure
        }
        other => PersistenceFailure::new(other.to_string()),
    }
}

fn row_to_event(row: &PgRow, schema: &str) -> Result<OutboxEvent, OutboxError> {
    let state: String = row.try_get("state").map_err(OutboxError::fetch_failed)?;
    let attempts: i32 = row.try_get("attempts").map_err(OutboxError::fetch_failed)?;

    Ok(OutboxEvent {
        id: row.try_get("id").map_err(OutboxError::fetch_failed)?,
        message_id: row.try_get("message_id").map_err(OutboxError::fetch_failed)?,
        producer_service: row
            .try_get("producer_service")
            .map_err(OutboxError::fetch_failed)?,
        event_type: row.try_get("event_type").map_err(OutboxError::fetch_failed)?,
        payload: row.try_get("payload").map_err(OutboxError::fetch_failed)?,
        partition_key: row
            .try_get("partition_key")
            .map_err(OutboxError::fetch_failed)?,
        schema: schema.to_string(),
        state: state.parse().map_err(OutboxError::fetch_failed)?,
        error_message: row
            .try_get("error_message")
            .map_err(OutboxError::fetch_failed)?,
        attempts: u32::try_from(attempts).unwrap_or(0),
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(OutboxError::fetch_failed)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(OutboxError::fetch_failed)?,
    })
}
