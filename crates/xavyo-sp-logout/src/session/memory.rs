//! In-memory enumerable logout store for testing and single-node setups

use super::directory::LogoutBackend;
use super::types::{BackendCapability, DirectoryError, LogoutRecord, SessionMap};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type RecordKey = (String, String, String);

/// In-memory logout store keyed by `(auth_source, identity_hash, session_index)`
#[derive(Debug, Default)]
pub struct InMemoryLogoutStore {
    records: Arc<RwLock<HashMap<RecordKey, LogoutRecord>>>,
}

impl InMemoryLogoutStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LogoutBackend for InMemoryLogoutStore {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Enumerable
    }

    async fn upsert(&self, record: LogoutRecord) -> Result<(), DirectoryError> {
        let key = (
            record.auth_source.clone(),
            record.identity_hash.clone(),
            record.session_index.clone(),
        );
        self.records.write().await.insert(key, record);
        Ok(())
    }

    async fn find_all(
        &self,
        auth_source: &str,
        identity_hash: &str,
    ) -> Result<SessionMap, DirectoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| {
                r.auth_source == auth_source && r.identity_hash == identity_hash && !r.is_expired()
            })
            .map(|r| (r.session_index.clone(), r.local_session_id.clone()))
            .collect())
    }

    async fn purge_expired(&self) -> Result<u64, DirectoryError> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, r| r.expires_at >= now);
        Ok((before - records.len()) as u64)
    }
}
