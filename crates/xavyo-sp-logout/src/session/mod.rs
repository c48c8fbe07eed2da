//! SP session tracking for Single Logout
//!
//! Maps `(auth source, identity, session index)` to local session ids so a
//! LogoutRequest from a remote party can be resolved to the local sessions it
//! refers to. Two kinds of backend are supported: an enumerable one that can
//! list every session of an identity (SQL, in-memory) and a point-lookup one
//! that can only resolve explicit session indexes (key/value caches).

pub mod directory;
pub mod kv;
pub mod local;
pub mod memory;
pub mod postgres;
pub mod types;

pub use directory::{
    LogoutBackend, SessionDirectory, SessionIndexVisitor, Traversal, VisitOutcome, VisitSummary,
};
pub use kv::{InMemoryKeyValueStore, KeyValueLogoutStore, KeyValueStore, LOGOUT_STORE_NAMESPACE};
pub use local::{InMemoryLocalSessionStore, LocalSession, LocalSessionStore, SessionStoreError};
pub use memory::InMemoryLogoutStore;
pub use postgres::PostgresLogoutStore;
pub use types::{BackendCapability, DirectoryError, LogoutRecord, SessionLookup, SessionMap};
