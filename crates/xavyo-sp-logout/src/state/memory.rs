//! In-memory orchestration state store for testing

use super::{LogoutStateStore, OrchestrationState, StateError};
use crate::config::{LogoutConfig, DEFAULT_STATE_TTL_SECONDS};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredState {
    state: OrchestrationState,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
}

/// In-memory state store with consume-once tokens
#[derive(Debug)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<Uuid, StoredState>>>,
    ttl: Duration,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_STATE_TTL_SECONDS)
    }
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ttl(ttl_seconds: i64) -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    #[must_use]
    pub fn from_config(config: &LogoutConfig) -> Self {
        Self::with_ttl(config.state_ttl_seconds)
    }
}

#[async_trait]
impl LogoutStateStore for InMemoryStateStore {
    async fn save(&self, state: &OrchestrationState) -> Result<Uuid, StateError> {
        let token = Uuid::new_v4();
        self.states.write().await.insert(
            token,
            StoredState {
                state: state.clone(),
                expires_at: Utc::now() + self.ttl,
                consumed_at: None,
            },
        );
        Ok(token)
    }

    async fn load(&self, token: Uuid) -> Result<OrchestrationState, StateError> {
        let mut states = self.states.write().await;
        let stored = states
            .get_mut(&token)
            .ok_or_else(|| StateError::NotFound(token.to_string()))?;

        if let Some(consumed_at) = stored.consumed_at {
            return Err(StateError::AlreadyConsumed {
                token: token.to_string(),
                consumed_at,
            });
        }
        if stored.expires_at <= Utc::now() {
            return Err(StateError::Expired {
                token: token.to_string(),
                expired_at: stored.expires_at,
            });
        }

        stored.consumed_at = Some(Utc::now());
        tracing::debug!(token = %token, "Logout state consumed");
        Ok(stored.state.clone())
    }

    async fn cleanup_expired(&self) -> Result<u64, StateError> {
        let mut states = self.states.write().await;
        let now = Utc::now();
        let before = states.len();
        states.retain(|_, s| s.consumed_at.is_none() && s.expires_at > now);
        Ok((before - states.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogoutContext, LogoutRequest, NameId};

    fn state() -> OrchestrationState {
        OrchestrationState::new(
            "idp1",
            LogoutRequest {
                id: "_req".to_string(),
                issuer: "https://idp.example.com".to_string(),
                name_id: NameId::new("alice"),
                session_indexes: vec!["abc".to_string()],
                relay_state: Some("rs".to_string()),
            },
            LogoutContext::default(),
            vec!["spA".to_string()],
        )
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemoryStateStore::new();
        let token = store.save(&state()).await.unwrap();
        let loaded = store.load(token).await.unwrap();
        assert_eq!(loaded, state());
    }

    #[tokio::test]
    async fn test_second_load_fails() {
        let store = InMemoryStateStore::new();
        let token = store.save(&state()).await.unwrap();
        store.load(token).await.unwrap();

        let err = store.load(token).await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyConsumed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let store = InMemoryStateStore::new();
        let err = store.load(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_state() {
        let store = InMemoryStateStore::with_ttl(0);
        let token = store.save(&state()).await.unwrap();

        let err = store.load(token).await.unwrap_err();
        assert!(matches!(err, StateError::Expired { .. }));
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_consumed_states() {
        let store = InMemoryStateStore::new();
        let consumed = store.save(&state()).await.unwrap();
        let pending = store.save(&state()).await.unwrap();
        store.load(consumed).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.load(pending).await.is_ok());
        let err = store.load(consumed).await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ttl_taken_from_config() {
        let mut config = LogoutConfig::new(url::Url::parse("https://sp.example.com/r").unwrap());
        config.state_ttl_seconds = 1;
        let store = InMemoryStateStore::from_config(&config);
        assert_eq!(store.ttl, Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_each_save_gets_fresh_token() {
        let store = InMemoryStateStore::new();
        let a = store.save(&state()).await.unwrap();
        let b = store.save(&state()).await.unwrap();
        assert_ne!(a, b);
    }
}
