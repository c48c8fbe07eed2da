//! Point-lookup logout store over a key/value cache.
//!
//! Entries are keyed `identity_hash:session_index` in a fixed namespace; the
//! auth source is not part of the key. Such a store cannot list the sessions
//! of an identity, so "log out everything" requests are unsupported.

use super::directory::LogoutBackend;
use super::types::{BackendCapability, DirectoryError, LogoutRecord, SessionMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Namespace used for logout entries in a shared key/value store.
pub const LOGOUT_STORE_NAMESPACE: &str = "saml.LogoutStore";

/// Minimal key/value store contract.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value for `key`, or `None` when absent or expired
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, DirectoryError>;

    /// Store `value` until `expires_at`
    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DirectoryError>;

    /// Drop expired entries; stores with native TTLs have nothing to do.
    async fn purge_expired(&self) -> Result<u64, DirectoryError> {
        Ok(0)
    }
}

/// In-memory key/value store with lazy expiry.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<(String, String), (String, DateTime<Utc>)>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, DirectoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .filter(|(_, expires_at)| *expires_at >= Utc::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        self.entries.write().await.insert(
            (namespace.to_string(), key.to_string()),
            (value.to_string(), expires_at),
        );
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, DirectoryError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at >= now);
        Ok((before - entries.len()) as u64)
    }
}

/// Logout backend over any `KeyValueStore`.
#[derive(Clone)]
pub struct KeyValueLogoutStore {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueLogoutStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn entry_key(identity_hash: &str, session_index: &str) -> String {
        format!("{identity_hash}:{session_index}")
    }
}

#[async_trait]
impl LogoutBackend for KeyValueLogoutStore {
    fn capability(&self) -> BackendCapability {
        BackendCapability::PointLookup
    }

    async fn upsert(&self, record: LogoutRecord) -> Result<(), DirectoryError> {
        self.store
            .set(
                LOGOUT_STORE_NAMESPACE,
                &Self::entry_key(&record.identity_hash, &record.session_index),
                &record.local_session_id,
                record.expires_at,
            )
            .await
    }

    async fn find_all(
        &self,
        _auth_source: &str,
        _identity_hash: &str,
    ) -> Result<SessionMap, DirectoryError> {
        Err(DirectoryError::NotEnumerable)
    }

    async fn find_indexes(
        &self,
        _auth_source: &str,
        identity_hash: &str,
        session_indexes: &[String],
    ) -> Result<SessionMap, DirectoryError> {
        let mut sessions = SessionMap::new();
        for index in session_indexes {
            let key = Self::entry_key(identity_hash, index);
            if let Some(local_session_id) = self.store.get(LOGOUT_STORE_NAMESPACE, &key).await? {
                sessions.insert(index.clone(), local_session_id);
            }
        }
        Ok(sessions)
    }

    async fn purge_expired(&self) -> Result<u64, DirectoryError> {
        self.store.purge_expired().await
    }
}
