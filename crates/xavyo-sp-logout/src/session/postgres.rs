//! PostgreSQL-backed logout store.
//!
//! The table is created on first use and versioned in a shared
//! `<prefix>_table_versions` table. Version 1 had a 30-character auth source
//! column; version 2 widens it to 255 (the longest FQDN). A failed upgrade is
//! logged and the store keeps running on the old column width.

use super::directory::LogoutBackend;
use super::types::{BackendCapability, DirectoryError, LogoutRecord, SessionMap};
use crate::config::LogoutConfig;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::OnceCell;

/// Current schema version of the logout store table.
pub const LOGOUT_STORE_TABLE_VERSION: i32 = 2;

const TABLE_VERSION_KEY: &str = "saml_logout_store";

/// PostgreSQL logout store for production
pub struct PostgresLogoutStore {
    pool: PgPool,
    table: String,
    versions_table: String,
    schema_ready: OnceCell<()>,
}

impl PostgresLogoutStore {
    /// `table_prefix` must already be validated (see `LogoutConfig`).
    #[must_use]
    pub fn new(pool: PgPool, table_prefix: &str) -> Self {
        Self {
            pool,
            table: format!("{table_prefix}_saml_logout_store"),
            versions_table: format!("{table_prefix}_table_versions"),
            schema_ready: OnceCell::new(),
        }
    }

    /// Store using the configured table prefix.
    #[must_use]
    pub fn from_config(pool: PgPool, config: &LogoutConfig) -> Self {
        Self::new(pool, &config.table_prefix)
    }

    /// Name of the logout table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Create or upgrade the table once per store instance.
    pub async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        self.schema_ready
            .get_or_try_init(|| self.create_or_migrate())
            .await
            .map(|_| ())
    }

    /// Recorded version of the logout table, if any.
    pub async fn table_version(&self) -> Result<Option<i32>, DirectoryError> {
        let create = format!(
            r"
            CREATE TABLE IF NOT EXISTS {} (
                name VARCHAR(255) PRIMARY KEY,
                version INTEGER NOT NULL
            )
            ",
            self.versions_table
        );
        sqlx::query(&create)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DirectoryError::SchemaError(format!("Failed to create table versions table: {e}"))
            })?;

        let select = format!("SELECT version FROM {} WHERE name = $1", self.versions_table);
        let version = sqlx::query_scalar::<_, i32>(&select)
            .bind(TABLE_VERSION_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DirectoryError::SchemaError(format!("Failed to read table version: {e}"))
            })?;

        Ok(version)
    }

    async fn set_table_version(&self, version: i32) -> Result<(), DirectoryError> {
        let upsert = format!(
            r"
            INSERT INTO {} (name, version) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET version = EXCLUDED.version
            ",
            self.versions_table
        );
        sqlx::query(&upsert)
            .bind(TABLE_VERSION_KEY)
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DirectoryError::SchemaError(format!("Failed to record table version: {e}"))
            })?;
        Ok(())
    }

    async fn create_or_migrate(&self) -> Result<(), DirectoryError> {
        match self.table_version().await? {
            Some(LOGOUT_STORE_TABLE_VERSION) => Ok(()),
            Some(1) => {
                self.migrate_from_v1().await;
                Ok(())
            }
            Some(other) => {
                tracing::warn!(
                    table = %self.table,
                    version = other,
                    "Unknown logout store table version, using as-is"
                );
                Ok(())
            }
            None => self.create_table().await,
        }
    }

    /// Widen the auth source column. Failures leave the v1 schema in place.
    async fn migrate_from_v1(&self) {
        let alter = format!(
            "ALTER TABLE {} ALTER COLUMN auth_source TYPE VARCHAR(255)",
            self.table
        );
        if let Err(e) = sqlx::query(&alter).execute(&self.pool).await {
            tracing::warn!(
                table = %self.table,
                error = %e,
                "Failed to upgrade logout store table, continuing with version 1 schema"
            );
            return;
        }
        match self.set_table_version(LOGOUT_STORE_TABLE_VERSION).await {
            Ok(()) => {
                tracing::info!(table = %self.table, "Upgraded logout store table to version 2");
            }
            Err(e) => {
                tracing::warn!(
                    table = %self.table,
                    error = %e,
                    "Upgraded logout store table but failed to record version"
                );
            }
        }
    }

    async fn create_table(&self) -> Result<(), DirectoryError> {
        let statements = [
            format!(
                r"
                CREATE TABLE IF NOT EXISTS {t} (
                    auth_source VARCHAR(255) NOT NULL,
                    identity_hash VARCHAR(40) NOT NULL,
                    session_index VARCHAR(50) NOT NULL,
                    expire TIMESTAMPTZ NOT NULL,
                    local_session_id VARCHAR(50) NOT NULL,
                    UNIQUE (auth_source, identity_hash, session_index)
                )
                ",
                t = self.table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {t}_expire ON {t} (expire)",
                t = self.table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {t}_identity ON {t} (auth_source, identity_hash)",
                t = self.table
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DirectoryError::SchemaError(format!("Failed to create logout store table: {e}"))
                })?;
        }

        self.set_table_version(LOGOUT_STORE_TABLE_VERSION).await?;
        tracing::info!(table = %self.table, "Created logout store table");
        Ok(())
    }
}

#[async_trait]
impl LogoutBackend for PostgresLogoutStore {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Enumerable
    }

    async fn upsert(&self, record: LogoutRecord) -> Result<(), DirectoryError> {
        self.ensure_schema().await?;

        let query = format!(
            r"
            INSERT INTO {} (auth_source, identity_hash, session_index, expire, local_session_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (auth_source, identity_hash, session_index) DO UPDATE
            SET expire = EXCLUDED.expire,
                local_session_id = EXCLUDED.local_session_id
            ",
            self.table
        );
        sqlx::query(&query)
            .bind(&record.auth_source)
            .bind(&record.identity_hash)
            .bind(&record.session_index)
            .bind(record.expires_at)
            .bind(&record.local_session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DirectoryError::StorageError(format!("Failed to record session: {e}")))?;

        Ok(())
    }

    async fn find_all(
        &self,
        auth_source: &str,
        identity_hash: &str,
    ) -> Result<SessionMap, DirectoryError> {
        self.ensure_schema().await?;

        let query = format!(
            r"
            SELECT session_index, local_session_id
            FROM {}
            WHERE auth_source = $1 AND identity_hash = $2 AND expire >= $3
            ",
            self.table
        );
        let rows = sqlx::query_as::<_, (String, String)>(&query)
            .bind(auth_source)
            .bind(identity_hash)
            .bind(Utc::now())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DirectoryError::StorageError(format!("Failed to get sessions: {e}")))?;

        Ok(rows.into_iter().collect())
    }

    async fn purge_expired(&self) -> Result<u64, DirectoryError> {
        self.ensure_schema().await?;

        let query = format!("DELETE FROM {} WHERE expire < $1", self.table);
        let result = sqlx::query(&query)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DirectoryError::StorageError(format!("Failed to clean logout store: {e}"))
            })?;

        Ok(result.rows_affected())
    }
}
