//! Terminates the local sessions named by a LogoutRequest

use crate::error::LogoutResult;
use crate::models::NameId;
use crate::session::{
    LocalSessionStore, SessionDirectory, SessionIndexVisitor, Traversal, VisitOutcome,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Outcome of `LogoutExecutor::logout_sessions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutCount {
    /// Number of local sessions actually logged out
    Terminated(usize),
    /// The directory cannot answer this request; the caller must fall back
    /// to an unconditional logout of the auth source.
    Unsupported,
}

/// Logs out local sessions resolved through the session directory.
#[derive(Clone)]
pub struct LogoutExecutor {
    directory: SessionDirectory,
    sessions: Arc<dyn LocalSessionStore>,
}

impl LogoutExecutor {
    #[must_use]
    pub fn new(directory: SessionDirectory, sessions: Arc<dyn LocalSessionStore>) -> Self {
        Self {
            directory,
            sessions,
        }
    }

    /// Log out every matched session authenticated with `auth_source`.
    ///
    /// An empty `session_indexes` means all sessions of the identity.
    pub async fn logout_sessions(
        &self,
        auth_source: &str,
        name_id: &NameId,
        session_indexes: &[String],
    ) -> LogoutResult<LogoutCount> {
        let mut visitor = LogoutVisitor {
            auth_source,
            sessions: self.sessions.as_ref(),
        };

        let traversal = self
            .directory
            .for_each_session_index(auth_source, name_id, session_indexes, &mut visitor)
            .await?;

        Ok(match traversal {
            Traversal::Completed(summary) => LogoutCount::Terminated(summary.handled),
            Traversal::Unsupported => LogoutCount::Unsupported,
        })
    }
}

struct LogoutVisitor<'a> {
    auth_source: &'a str,
    sessions: &'a dyn LocalSessionStore,
}

#[async_trait]
impl<'a> SessionIndexVisitor for LogoutVisitor<'a> {
    async fn on_session_index(
        &mut self,
        _session_index: &str,
        local_session_id: Option<&str>,
    ) -> LogoutResult<VisitOutcome> {
        let Some(local_session_id) = local_session_id else {
            return Ok(VisitOutcome::UnknownIndex);
        };
        let Some(session) = self.sessions.get(local_session_id).await? else {
            return Ok(VisitOutcome::MissingSession);
        };
        if !session.is_valid(self.auth_source) {
            return Ok(VisitOutcome::NotAuthenticated);
        }

        tracing::info!(
            auth_source = %self.auth_source,
            track_id = %session.track_id,
            "Logging out of local session"
        );
        self.sessions
            .logout(local_session_id, self.auth_source)
            .await?;
        Ok(VisitOutcome::Handled)
    }
}
