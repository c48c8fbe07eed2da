//! SAML 2.0 Service Provider Single Logout for xavyo
//!
//! This crate provides the SP side of SAML Single Logout:
//! - Session directory mapping (auth source, identity, `SessionIndex`) to local sessions
//! - Relational and key-value backends for the directory
//! - Collection of the parties local sessions are associated with
//! - Termination of local sessions named by a `LogoutRequest`
//! - Resumable multi-party logout with single-use resume tokens

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod session;
pub mod state;

pub use config::{ConfigError, LogoutConfig};
pub use error::{LogoutError, LogoutResult};
pub use handlers::SpLogoutState;
pub use models::{Delivery, LogoutContext, LogoutRequest, LogoutResponse, NameId};
pub use router::sp_logout_router;
pub use services::{
    AssociationCollector, Associations, LogoutBinding, LogoutCollaborators, LogoutCount,
    LogoutExecutor, LogoutOrchestrator, LogoutStep, PartyLogout, SourceLogout,
};
pub use session::{
    InMemoryLocalSessionStore, InMemoryLogoutStore, KeyValueLogoutStore, LocalSession,
    LocalSessionStore, PostgresLogoutStore, SessionDirectory,
};
pub use state::{InMemoryStateStore, LogoutStateStore, PostgresStateStore};
