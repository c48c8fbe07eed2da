//! Session directory over a pluggable logout store backend.

use super::types::{BackendCapability, DirectoryError, LogoutRecord, SessionLookup, SessionMap};
use crate::config::{LogoutConfig, DEFAULT_SWEEP_PER_MILLE};
use crate::error::LogoutResult;
use crate::models::NameId;
use crate::services::identity::{hash_identity, normalize_known_index, normalize_session_index};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;

/// Storage backend for logout records.
#[async_trait]
pub trait LogoutBackend: Send + Sync {
    /// Which queries this backend can answer
    fn capability(&self) -> BackendCapability;

    /// Insert or replace a record (last write wins on the unique key)
    async fn upsert(&self, record: LogoutRecord) -> Result<(), DirectoryError>;

    /// All non-expired sessions of an identity.
    ///
    /// Point-lookup backends return `DirectoryError::NotEnumerable`.
    async fn find_all(
        &self,
        auth_source: &str,
        identity_hash: &str,
    ) -> Result<SessionMap, DirectoryError>;

    /// Non-expired sessions among `session_indexes` (already normalized).
    async fn find_indexes(
        &self,
        auth_source: &str,
        identity_hash: &str,
        session_indexes: &[String],
    ) -> Result<SessionMap, DirectoryError> {
        let mut sessions = self.find_all(auth_source, identity_hash).await?;
        sessions.retain(|index, _| session_indexes.contains(index));
        Ok(sessions)
    }

    /// Delete expired records (returns count of deleted records)
    async fn purge_expired(&self) -> Result<u64, DirectoryError>;
}

/// What happened to one session index during an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// No record for this index
    UnknownIndex,
    /// Record found but the local session no longer exists
    MissingSession,
    /// Local session exists but is not authenticated with the auth source
    NotAuthenticated,
    /// The visitor acted on the session
    Handled,
}

/// Tally of visit outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitSummary {
    pub handled: usize,
    pub skipped: usize,
}

/// Result of `SessionDirectory::for_each_session_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Completed(VisitSummary),
    Unsupported,
}

/// Per-index strategy used by `SessionDirectory::for_each_session_index`.
#[async_trait]
pub trait SessionIndexVisitor: Send {
    /// Called once per session index; `local_session_id` is `None` when the
    /// index is not known to the directory.
    async fn on_session_index(
        &mut self,
        session_index: &str,
        local_session_id: Option<&str>,
    ) -> LogoutResult<VisitOutcome>;
}

/// Directory of tracked sessions.
///
/// Without a backend every operation is a no-op and lookups are unsupported,
/// so callers fall back to an unconditional logout.
#[derive(Clone)]
pub struct SessionDirectory {
    backend: Option<Arc<dyn LogoutBackend>>,
    sweep_per_mille: u32,
}

impl SessionDirectory {
    #[must_use]
    pub fn new(backend: Arc<dyn LogoutBackend>) -> Self {
        Self {
            backend: Some(backend),
            sweep_per_mille: DEFAULT_SWEEP_PER_MILLE,
        }
    }

    #[must_use]
    pub fn from_config(backend: Arc<dyn LogoutBackend>, config: &LogoutConfig) -> Self {
        Self::new(backend).with_sweep_per_mille(config.sweep_per_mille)
    }

    /// A directory with no backend configured.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: None,
            sweep_per_mille: DEFAULT_SWEEP_PER_MILLE,
        }
    }

    #[must_use]
    pub fn with_sweep_per_mille(mut self, sweep_per_mille: u32) -> Self {
        self.sweep_per_mille = sweep_per_mille.min(1000);
        self
    }

    #[must_use]
    pub fn capability(&self) -> Option<BackendCapability> {
        self.backend.as_ref().map(|b| b.capability())
    }

    /// Track a local session established under `name_id`.
    ///
    /// A missing `session_index` is replaced by a generated one that no
    /// LogoutRequest can name. Roughly one call in a hundred also sweeps
    /// expired records.
    pub async fn register_session(
        &self,
        auth_source: &str,
        name_id: &NameId,
        session_index: Option<&str>,
        expires_at: DateTime<Utc>,
        local_session_id: &str,
    ) -> Result<(), DirectoryError> {
        let Some(backend) = &self.backend else {
            tracing::debug!(
                auth_source = %auth_source,
                "No logout store configured, session not tracked"
            );
            return Ok(());
        };

        if session_index.is_none() {
            tracing::debug!(
                auth_source = %auth_source,
                "No SessionIndex from IdP, generating one"
            );
        }

        let record = LogoutRecord {
            auth_source: auth_source.to_string(),
            identity_hash: hash_identity(name_id),
            session_index: normalize_session_index(session_index),
            local_session_id: local_session_id.to_string(),
            expires_at,
        };

        if sweep_due(self.sweep_per_mille) {
            tracing::debug!("Cleaning logout store");
            match backend.purge_expired().await {
                Ok(deleted) if deleted > 0 => {
                    tracing::debug!(deleted = deleted, "Purged expired logout records");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired logout records"),
            }
        }

        backend.upsert(record).await
    }

    /// Resolve session indexes to local session ids.
    ///
    /// An empty `session_indexes` asks for every session of the identity,
    /// which only an enumerable backend can answer.
    pub async fn lookup_sessions(
        &self,
        auth_source: &str,
        name_id: &NameId,
        session_indexes: &[String],
    ) -> Result<SessionLookup, DirectoryError> {
        let Some(backend) = &self.backend else {
            return Ok(SessionLookup::Unsupported);
        };

        let identity_hash = hash_identity(name_id);
        if session_indexes.is_empty() {
            if !backend.capability().is_enumerable() {
                return Ok(SessionLookup::Unsupported);
            }
            let sessions = backend.find_all(auth_source, &identity_hash).await?;
            return Ok(SessionLookup::Found(sessions));
        }

        let normalized: Vec<String> = session_indexes
            .iter()
            .map(|index| normalize_known_index(index))
            .collect();
        let sessions = backend
            .find_indexes(auth_source, &identity_hash, &normalized)
            .await?;
        Ok(SessionLookup::Found(sessions))
    }

    /// Whether `lookup_sessions` can answer a query for `session_indexes`.
    #[must_use]
    pub fn can_serve(&self, session_indexes: &[String]) -> bool {
        match self.capability() {
            None => false,
            Some(capability) => !session_indexes.is_empty() || capability.is_enumerable(),
        }
    }

    /// Visit each requested session index (or every known one when none are
    /// requested) and tally the visitor's outcomes.
    pub async fn for_each_session_index<V>(
        &self,
        auth_source: &str,
        name_id: &NameId,
        session_indexes: &[String],
        visitor: &mut V,
    ) -> LogoutResult<Traversal>
    where
        V: SessionIndexVisitor + ?Sized,
    {
        let sessions = match self
            .lookup_sessions(auth_source, name_id, session_indexes)
            .await?
        {
            SessionLookup::Found(sessions) => sessions,
            SessionLookup::Unsupported => return Ok(Traversal::Unsupported),
        };

        let indexes: Vec<String> = if session_indexes.is_empty() {
            sessions.keys().cloned().collect()
        } else {
            session_indexes
                .iter()
                .map(|index| normalize_known_index(index))
                .collect()
        };

        let mut summary = VisitSummary::default();
        for index in &indexes {
            let local_session_id = sessions.get(index).map(String::as_str);
            let outcome = visitor.on_session_index(index, local_session_id).await?;
            match outcome {
                VisitOutcome::Handled => summary.handled += 1,
                VisitOutcome::UnknownIndex => {
                    tracing::info!(
                        auth_source = %auth_source,
                        session_index = %index,
                        "Logout requested for unknown SessionIndex"
                    );
                    summary.skipped += 1;
                }
                VisitOutcome::MissingSession => {
                    tracing::info!(
                        auth_source = %auth_source,
                        session_index = %index,
                        "Skipping missing local session"
                    );
                    summary.skipped += 1;
                }
                VisitOutcome::NotAuthenticated => {
                    tracing::info!(
                        auth_source = %auth_source,
                        session_index = %index,
                        "Skipping local session because it isn't authenticated"
                    );
                    summary.skipped += 1;
                }
            }
        }

        Ok(Traversal::Completed(summary))
    }
}

/// Roll for an opportunistic expiry sweep with a `per_mille` chance.
pub(crate) fn sweep_due(per_mille: u32) -> bool {
    per_mille > 0 && rand::thread_rng().gen_range(0..1000) < per_mille
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InMemoryKeyValueStore, InMemoryLogoutStore, KeyValueLogoutStore};
    use chrono::Duration;

    fn sql_like() -> (Arc<InMemoryLogoutStore>, SessionDirectory) {
        let backend = Arc::new(InMemoryLogoutStore::new());
        let directory = SessionDirectory::new(backend.clone()).with_sweep_per_mille(0);
        (backend, directory)
    }

    fn point_lookup() -> SessionDirectory {
        let backend = KeyValueLogoutStore::new(Arc::new(InMemoryKeyValueStore::new()));
        SessionDirectory::new(Arc::new(backend)).with_sweep_per_mille(0)
    }

    fn alice() -> NameId {
        NameId::new("alice@example.com")
    }

    /// Records every index it sees and reports a fixed outcome for known ones.
    struct Recorder {
        seen: Vec<(String, Option<String>)>,
    }

    #[async_trait]
    impl SessionIndexVisitor for Recorder {
        async fn on_session_index(
            &mut self,
            session_index: &str,
            local_session_id: Option<&str>,
        ) -> LogoutResult<VisitOutcome> {
            self.seen.push((
                session_index.to_string(),
                local_session_id.map(str::to_string),
            ));
            Ok(match local_session_id {
                Some(_) => VisitOutcome::Handled,
                None => VisitOutcome::UnknownIndex,
            })
        }
    }

    #[tokio::test]
    async fn test_register_then_lookup_all() {
        let (_, directory) = sql_like();
        directory
            .register_session(
                "idp1",
                &alice(),
                Some("abc"),
                Utc::now() + Duration::hours(1),
                "s1",
            )
            .await
            .unwrap();

        let lookup = directory
            .lookup_sessions("idp1", &alice(), &[])
            .await
            .unwrap();
        let sessions = lookup.into_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions.get("abc").map(String::as_str), Some("s1"));
    }

    #[tokio::test]
    async fn test_lookup_scoped_to_auth_source_and_identity() {
        let (_, directory) = sql_like();
        let expires = Utc::now() + Duration::hours(1);
        directory
            .register_session("idp1", &alice(), Some("abc"), expires, "s1")
            .await
            .unwrap();
        directory
            .register_session("idp2", &alice(), Some("abc"), expires, "s2")
            .await
            .unwrap();
        directory
            .register_session("idp1", &NameId::new("bob"), Some("abc"), expires, "s3")
            .await
            .unwrap();

        let sessions = directory
            .lookup_sessions("idp1", &alice(), &[])
            .await
            .unwrap()
            .into_sessions()
            .unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions["abc"], "s1");
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let (_, directory) = sql_like();
        let expires = Utc::now() + Duration::hours(1);
        directory
            .register_session("idp1", &alice(), Some("abc"), expires, "s1")
            .await
            .unwrap();
        directory
            .register_session("idp1", &alice(), Some("abc"), expires, "s1-refreshed")
            .await
            .unwrap();

        let sessions = directory
            .lookup_sessions("idp1", &alice(), &["abc".to_string()])
            .await
            .unwrap()
            .into_sessions()
            .unwrap();
        assert_eq!(sessions["abc"], "s1-refreshed");
    }

    #[tokio::test]
    async fn test_expired_record_not_returned() {
        let (_, directory) = sql_like();
        directory
            .register_session(
                "idp1",
                &alice(),
                Some("abc"),
                Utc::now() - Duration::seconds(1),
                "s1",
            )
            .await
            .unwrap();

        let sessions = directory
            .lookup_sessions("idp1", &alice(), &[])
            .await
            .unwrap()
            .into_sessions()
            .unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_missing_index_never_matches_a_request() {
        let (_, directory) = sql_like();
        directory
            .register_session(
                "idp1",
                &alice(),
                None,
                Utc::now() + Duration::hours(1),
                "s1",
            )
            .await
            .unwrap();

        let all = directory
            .lookup_sessions("idp1", &alice(), &[])
            .await
            .unwrap()
            .into_sessions()
            .unwrap();
        assert_eq!(all.len(), 1);
        let generated = all.keys().next().unwrap();
        assert!(generated.starts_with('_'));

        for candidate in ["abc", "", "_", "s1"] {
            let found = directory
                .lookup_sessions("idp1", &alice(), &[candidate.to_string()])
                .await
                .unwrap()
                .into_sessions()
                .unwrap();
            assert!(found.is_empty(), "index {candidate:?} should not match");
        }
    }

    #[tokio::test]
    async fn test_long_index_resolves_on_lookup() {
        let (_, directory) = sql_like();
        let long_index = "i".repeat(80);
        directory
            .register_session(
                "idp1",
                &alice(),
                Some(&long_index),
                Utc::now() + Duration::hours(1),
                "s1",
            )
            .await
            .unwrap();

        let sessions = directory
            .lookup_sessions("idp1", &alice(), &[long_index])
            .await
            .unwrap()
            .into_sessions()
            .unwrap();
        assert_eq!(sessions.values().next().map(String::as_str), Some("s1"));
    }

    #[tokio::test]
    async fn test_full_sweep_probability_purges() {
        let backend = Arc::new(InMemoryLogoutStore::new());
        let directory = SessionDirectory::new(backend.clone()).with_sweep_per_mille(1000);

        directory
            .register_session(
                "idp1",
                &alice(),
                Some("old"),
                Utc::now() - Duration::hours(1),
                "s0",
            )
            .await
            .unwrap();
        directory
            .register_session(
                "idp1",
                &alice(),
                Some("new"),
                Utc::now() + Duration::hours(1),
                "s1",
            )
            .await
            .unwrap();

        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_can_serve_point_lookup() {
        let directory = point_lookup();
        assert!(!directory.can_serve(&[]));
        assert!(directory.can_serve(&["abc".to_string()]));
    }

    #[tokio::test]
    async fn test_can_serve_enumerable_and_disabled() {
        let (_, directory) = sql_like();
        assert!(directory.can_serve(&[]));
        assert!(directory.can_serve(&["abc".to_string()]));

        let disabled = SessionDirectory::disabled();
        assert!(!disabled.can_serve(&[]));
        assert!(!disabled.can_serve(&["abc".to_string()]));
    }

    #[tokio::test]
    async fn test_point_lookup_requires_indexes() {
        let directory = point_lookup();
        directory
            .register_session(
                "idp1",
                &alice(),
                Some("abc"),
                Utc::now() + Duration::hours(1),
                "s1",
            )
            .await
            .unwrap();

        let all = directory
            .lookup_sessions("idp1", &alice(), &[])
            .await
            .unwrap();
        assert!(all.is_unsupported());

        let explicit = directory
            .lookup_sessions("idp1", &alice(), &["abc".to_string(), "zzz".to_string()])
            .await
            .unwrap()
            .into_sessions()
            .unwrap();
        assert_eq!(explicit.len(), 1);
        assert_eq!(explicit["abc"], "s1");
    }

    #[tokio::test]
    async fn test_disabled_directory_is_noop() {
        let directory = SessionDirectory::disabled();
        directory
            .register_session(
                "idp1",
                &alice(),
                Some("abc"),
                Utc::now() + Duration::hours(1),
                "s1",
            )
            .await
            .unwrap();
        let lookup = directory
            .lookup_sessions("idp1", &alice(), &["abc".to_string()])
            .await
            .unwrap();
        assert!(lookup.is_unsupported());
    }

    #[tokio::test]
    async fn test_visitor_sees_requested_indexes_in_order() {
        let (_, directory) = sql_like();
        directory
            .register_session(
                "idp1",
                &alice(),
                Some("abc"),
                Utc::now() + Duration::hours(1),
                "s1",
            )
            .await
            .unwrap();

        let mut recorder = Recorder { seen: Vec::new() };
        let traversal = directory
            .for_each_session_index(
                "idp1",
                &alice(),
                &["unknown".to_string(), "abc".to_string()],
                &mut recorder,
            )
            .await
            .unwrap();

        assert_eq!(
            traversal,
            Traversal::Completed(VisitSummary {
                handled: 1,
                skipped: 1,
            })
        );
        assert_eq!(
            recorder.seen,
            vec![
                ("unknown".to_string(), None),
                ("abc".to_string(), Some("s1".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_visitor_unsupported_on_point_lookup() {
        let directory = point_lookup();
        let mut recorder = Recorder { seen: Vec::new() };
        let traversal = directory
            .for_each_session_index("idp1", &alice(), &[], &mut recorder)
            .await
            .unwrap();
        assert_eq!(traversal, Traversal::Unsupported);
        assert!(recorder.seen.is_empty());
    }
}
