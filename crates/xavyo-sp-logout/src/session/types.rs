//! Types shared by the session directory and its backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Session index -> local session id
pub type SessionMap = BTreeMap<String, String>;

/// One tracked local session.
///
/// `(auth_source, identity_hash, session_index)` is unique; writing the same
/// key again replaces the previous record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRecord {
    pub auth_source: String,
    /// Hex SHA-1 of the serialized NameID
    pub identity_hash: String,
    /// Normalized session index (at most 50 characters)
    pub session_index: String,
    pub local_session_id: String,
    pub expires_at: DateTime<Utc>,
}

impl LogoutRecord {
    /// Whether `expires_at` has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// What kind of queries a backend can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCapability {
    /// Can list all sessions of an identity (SQL, in-memory)
    Enumerable,
    /// Can only resolve explicit session indexes (key/value stores)
    PointLookup,
}

impl BackendCapability {
    #[must_use]
    pub fn is_enumerable(self) -> bool {
        self == BackendCapability::Enumerable
    }
}

/// Result of a directory lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Found(SessionMap),
    /// No backend, or an "all sessions" query on a point-lookup backend
    Unsupported,
}

impl SessionLookup {
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SessionLookup::Unsupported)
    }

    /// The resolved sessions, if the lookup was supported.
    #[must_use]
    pub fn into_sessions(self) -> Option<SessionMap> {
        match self {
            SessionLookup::Found(sessions) => Some(sessions),
            SessionLookup::Unsupported => None,
        }
    }
}

/// Session directory errors
#[derive(Debug, Error, Clone)]
pub enum DirectoryError {
    /// Backend cannot enumerate sessions
    #[error("Logout store backend cannot enumerate sessions")]
    NotEnumerable,

    /// Schema creation failed
    #[error("Logout store schema error: {0}")]
    SchemaError(String),

    /// Storage error
    #[error("Logout store storage error: {0}")]
    StorageError(String),
}
