//! Resumable logout state.
//!
//! A logout that has to visit other parties leaves this process after every
//! redirect. Everything needed to continue lives in an `OrchestrationState`
//! persisted under a single-use token; the next request carrying that token
//! picks the flow up again.

pub mod memory;
pub mod postgres;

use crate::models::{LogoutContext, LogoutRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryStateStore;
pub use postgres::PostgresStateStore;

/// Phase of a logout flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutPhase {
    /// Inbound request received, associations not yet collected
    Init,
    /// Parties remain to be visited
    Dispatching,
    /// All parties visited, local sessions next
    Responding,
    /// Response handed to the binding
    Done,
}

impl fmt::Display for LogoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Responding => write!(f, "responding"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Progress of one logout flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationState {
    /// Auth source the LogoutRequest was received for
    pub auth_source: String,
    /// Parties not yet notified, in collection order
    pub remaining_parties: VecDeque<String>,
    pub original_request: LogoutRequest,
    pub context: LogoutContext,
}

impl OrchestrationState {
    pub fn new(
        auth_source: impl Into<String>,
        original_request: LogoutRequest,
        context: LogoutContext,
        parties: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            auth_source: auth_source.into(),
            remaining_parties: parties.into_iter().collect(),
            original_request,
            context,
        }
    }

    #[must_use]
    pub fn phase(&self) -> LogoutPhase {
        if self.remaining_parties.is_empty() {
            LogoutPhase::Responding
        } else {
            LogoutPhase::Dispatching
        }
    }

    /// The next party and the state left once it has been taken off the queue.
    #[must_use]
    pub fn next_party(&self) -> Option<(String, OrchestrationState)> {
        let mut next = self.clone();
        let party = next.remaining_parties.pop_front()?;
        Some((party, next))
    }
}

/// Orchestration state store errors
#[derive(Debug, Error, Clone)]
pub enum StateError {
    /// Token not known to the store
    #[error("Logout state not found: {0}")]
    NotFound(String),

    /// State outlived its TTL
    #[error("Logout state expired: {token} (expired at {expired_at})")]
    Expired {
        token: String,
        expired_at: DateTime<Utc>,
    },

    /// Token was already used
    #[error("Logout state {token} was already resumed at {consumed_at}")]
    AlreadyConsumed {
        token: String,
        consumed_at: DateTime<Utc>,
    },

    /// State could not be encoded or decoded
    #[error("Logout state serialization error: {0}")]
    Serialization(String),

    /// Storage error
    #[error("Logout state storage error: {0}")]
    StorageError(String),
}

/// Persistence for orchestration state between redirects.
#[async_trait]
pub trait LogoutStateStore: Send + Sync {
    /// Persist `state` under a fresh token
    async fn save(&self, state: &OrchestrationState) -> Result<Uuid, StateError>;

    /// Load and consume the state saved under `token`.
    ///
    /// A token can be loaded once; later loads fail with `AlreadyConsumed`.
    async fn load(&self, token: Uuid) -> Result<OrchestrationState, StateError>;

    /// Delete expired and consumed states (returns count of deleted states).
    ///
    /// The orchestrator calls this opportunistically; deployments with little
    /// logout traffic should also schedule it.
    async fn cleanup_expired(&self) -> Result<u64, StateError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NameId;

    fn state(parties: &[&str]) -> OrchestrationState {
        OrchestrationState::new(
            "idp1",
            LogoutRequest {
                id: "_req".to_string(),
                issuer: "https://idp.example.com".to_string(),
                name_id: NameId::new("alice"),
                session_indexes: vec![],
                relay_state: None,
            },
            LogoutContext::default(),
            parties.iter().map(|p| (*p).to_string()),
        )
    }

    #[test]
    fn test_next_party_leaves_original_untouched() {
        let original = state(&["spA", "spB"]);
        let (party, next) = original.next_party().unwrap();

        assert_eq!(party, "spA");
        assert_eq!(
            next.remaining_parties,
            VecDeque::from(vec!["spB".to_string()])
        );
        assert_eq!(original.remaining_parties.len(), 2);
        assert_eq!(next.phase(), LogoutPhase::Dispatching);
    }

    #[test]
    fn test_empty_queue_is_responding() {
        let empty = state(&[]);
        assert!(empty.next_party().is_none());
        assert_eq!(empty.phase(), LogoutPhase::Responding);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let original = state(&["spA"]);
        let json = serde_json::to_value(&original).unwrap();
        let decoded: OrchestrationState = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, original);
    }
}
