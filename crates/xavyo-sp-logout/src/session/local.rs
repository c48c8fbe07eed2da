//! Contract with the local session layer.
//!
//! Local sessions are owned elsewhere; logout only needs to load one, check
//! whether it is still authenticated with an auth source, read its
//! associations and log it out of that source.

use crate::services::associations::Associations;
use crate::services::identity::generate_id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Snapshot of a local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSession {
    pub session_id: String,
    /// Short id used in logs instead of the session id
    pub track_id: String,
    /// Auth source -> authentication expiry
    pub authorities: BTreeMap<String, DateTime<Utc>>,
    /// Parties this session is also logged into
    pub associations: Associations,
}

impl LocalSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        let mut track_id = generate_id();
        track_id.truncate(11);
        Self {
            session_id: session_id.into(),
            track_id,
            authorities: BTreeMap::new(),
            associations: Associations::new(),
        }
    }

    #[must_use]
    pub fn authenticated(
        mut self,
        auth_source: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        self.authorities.insert(auth_source.into(), expires_at);
        self
    }

    #[must_use]
    pub fn with_associations(mut self, associations: Associations) -> Self {
        self.associations = associations;
        self
    }

    /// Whether the session is currently authenticated with `auth_source`.
    #[must_use]
    pub fn is_valid(&self, auth_source: &str) -> bool {
        self.authorities
            .get(auth_source)
            .is_some_and(|expires_at| *expires_at > Utc::now())
    }
}

/// Local session store error
#[derive(Debug, Error, Clone)]
pub enum SessionStoreError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Access to local sessions
#[async_trait]
pub trait LocalSessionStore: Send + Sync {
    /// Load a session by id
    async fn get(&self, session_id: &str) -> Result<Option<LocalSession>, SessionStoreError>;

    /// Log the session out of `auth_source`
    async fn logout(&self, session_id: &str, auth_source: &str) -> Result<(), SessionStoreError>;
}

/// In-memory local session store for testing
#[derive(Debug, Default)]
pub struct InMemoryLocalSessionStore {
    sessions: Arc<RwLock<HashMap<String, LocalSession>>>,
}

impl InMemoryLocalSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a session
    pub async fn insert(&self, session: LocalSession) {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
    }
}

#[async_trait]
impl LocalSessionStore for InMemoryLocalSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<LocalSession>, SessionStoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn logout(&self, session_id: &str, auth_source: &str) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.authorities.remove(auth_source);
        }
        Ok(())
    }
}
