//! Collects the associations of every local session an identity holds

use crate::error::LogoutResult;
use crate::models::NameId;
use crate::services::associations::Associations;
use crate::session::{
    LocalSessionStore, SessionDirectory, SessionIndexVisitor, Traversal, VisitOutcome,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Merges associations across the local sessions matched by a LogoutRequest.
#[derive(Clone)]
pub struct AssociationCollector {
    directory: SessionDirectory,
    sessions: Arc<dyn LocalSessionStore>,
}

impl AssociationCollector {
    #[must_use]
    pub fn new(directory: SessionDirectory, sessions: Arc<dyn LocalSessionStore>) -> Self {
        Self {
            directory,
            sessions,
        }
    }

    /// Merged associations of every matched session still authenticated with
    /// `auth_source`. Unsupported lookups yield no associations.
    pub async fn collect_associations(
        &self,
        auth_source: &str,
        name_id: &NameId,
        session_indexes: &[String],
    ) -> LogoutResult<Associations> {
        let mut visitor = CollectVisitor {
            auth_source,
            sessions: self.sessions.as_ref(),
            collected: Associations::new(),
        };

        let traversal = self
            .directory
            .for_each_session_index(auth_source, name_id, session_indexes, &mut visitor)
            .await?;

        if traversal == Traversal::Unsupported {
            tracing::debug!(
                auth_source = %auth_source,
                "Session lookup unsupported, no associations collected"
            );
        }

        Ok(visitor.collected)
    }
}

struct CollectVisitor<'a> {
    auth_source: &'a str,
    sessions: &'a dyn LocalSessionStore,
    collected: Associations,
}

#[async_trait]
impl<'a> SessionIndexVisitor for CollectVisitor<'a> {
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

        self.collected.merge(session.associations);
        Ok(VisitOutcome::Handled)
    }
}
