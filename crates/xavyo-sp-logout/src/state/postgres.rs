//! PostgreSQL-backed orchestration state store

use super::{LogoutStateStore, OrchestrationState, StateError};
use crate::config::LogoutConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// PostgreSQL state store for production
pub struct PostgresStateStore {
    pool: PgPool,
    table: String,
    ttl: Duration,
    schema_ready: OnceCell<()>,
}

#[derive(sqlx::FromRow)]
struct StateRow {
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
}

impl PostgresStateStore {
    /// `table_prefix` must already be validated (see `LogoutConfig`).
    #[must_use]
    pub fn new(pool: PgPool, table_prefix: &str, ttl_seconds: i64) -> Self {
        Self {
            pool,
            table: format!("{table_prefix}_saml_logout_states"),
            ttl: Duration::seconds(ttl_seconds),
            schema_ready: OnceCell::new(),
        }
    }

    /// Store using the configured table prefix and state TTL.
    #[must_use]
    pub fn from_config(pool: PgPool, config: &LogoutConfig) -> Self {
        Self::new(pool, &config.table_prefix, config.state_ttl_seconds)
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn ensure_schema(&self) -> Result<(), StateError> {
        self.schema_ready
            .get_or_try_init(|| async {
                let statements = [
                    format!(
                        r"
                        CREATE TABLE IF NOT EXISTS {t} (
                            id UUID PRIMARY KEY,
                            state JSONB NOT NULL,
                            created_at TIMESTAMPTZ NOT NULL,
                            expires_at TIMESTAMPTZ NOT NULL,
                            consumed_at TIMESTAMPTZ
                        )
                        ",
                        t = self.table
                    ),
                    format!(
                        "CREATE INDEX IF NOT EXISTS {t}_expires_at ON {t} (expires_at)",
                        t = self.table
                    ),
                ];
                for statement in &statements {
                    sqlx::query(statement)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| {
                            StateError::StorageError(format!(
                                "Failed to create logout state table: {e}"
                            ))
                        })?;
                }
                Ok::<(), StateError>(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl LogoutStateStore for PostgresStateStore {
    async fn save(&self, state: &OrchestrationState) -> Result<Uuid, StateError> {
        self.ensure_schema().await?;

        let token = Uuid::new_v4();
        let now = Utc::now();
        let query = format!(
            r"
            INSERT INTO {} (id, state, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
            self.table
        );
        sqlx::query(&query)
            .bind(token)
            .bind(Json(state))
            .bind(now)
            .bind(now + self.ttl)
            .execute(&self.pool)
            .await
            .map_err(|e| StateError::StorageError(format!("Failed to save logout state: {e}")))?;

        Ok(token)
    }

    async fn load(&self, token: Uuid) -> Result<OrchestrationState, StateError> {
        self.ensure_schema().await?;

        let now = Utc::now();
        let consume = format!(
            r"
            UPDATE {}
            SET consumed_at = $2
            WHERE id = $1
              AND consumed_at IS NULL
              AND expires_at > $2
            RETURNING state
            ",
            self.table
        );
        let consumed = sqlx::query_scalar::<_, Json<OrchestrationState>>(&consume)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                    StateError::Serialization(e.to_string())
                }
                other => StateError::StorageError(format!("Failed to load logout state: {other}")),
            })?;

        if let Some(Json(state)) = consumed {
            tracing::debug!(token = %token, "Logout state consumed");
            return Ok(state);
        }

        // Nothing matched; find out why
        let lookup = format!(
            "SELECT expires_at, consumed_at FROM {} WHERE id = $1",
            self.table
        );
        let existing = sqlx::query_as::<_, StateRow>(&lookup)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                StateError::StorageError(format!("Failed to look up logout state: {e}"))
            })?;

        match existing {
            None => Err(StateError::NotFound(token.to_string())),
            Some(StateRow {
                consumed_at: Some(consumed_at),
                ..
            }) => Err(StateError::AlreadyConsumed {
                token: token.to_string(),
                consumed_at,
            }),
            Some(StateRow { expires_at, .. }) => Err(StateError::Expired {
                token: token.to_string(),
                expired_at: expires_at,
            }),
        }
    }

    async fn cleanup_expired(&self) -> Result<u64, StateError> {
        self.ensure_schema().await?;

        let query = format!(
            "DELETE FROM {} WHERE expires_at < $1 OR consumed_at IS NOT NULL",
            self.table
        );
        let result = sqlx::query(&query)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StateError::StorageError(format!("Failed to clean up logout states: {e}"))
            })?;

        Ok(result.rows_affected())
    }
}
