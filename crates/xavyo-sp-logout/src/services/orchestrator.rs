//! SAML SP Single Logout orchestration.
//!
//! A LogoutRequest received for one auth source may require logging out of
//! other parties the local sessions are associated with (e.g. SPs logged in
//! through a hosted IdP). Those parties are visited one at a time, each
//! through a browser redirect that leaves this process. Progress is saved
//! under a fresh single-use token before every redirect and the party sends
//! the browser back to the resume URL carrying that token. Once no parties
//! remain, the local sessions are terminated and the LogoutResponse is sent.

use crate::config::LogoutConfig;
use crate::error::{LogoutError, LogoutResult};
use crate::models::{Delivery, LogoutContext, LogoutRequest, LogoutResponse};
use crate::services::collector::AssociationCollector;
use crate::services::executor::{LogoutCount, LogoutExecutor};
use crate::services::identity::generate_id;
use crate::session::directory::sweep_due;
use crate::session::{LocalSessionStore, SessionDirectory};
use crate::state::{LogoutPhase, LogoutStateStore, OrchestrationState};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// Starts a redirect-based logout at another party.
#[async_trait]
pub trait PartyLogout: Send + Sync {
    /// Where to send the browser so `party_id` logs out and then returns to
    /// `return_url`.
    async fn logout_redirect(&self, party_id: &str, return_url: &Url) -> LogoutResult<Delivery>;
}

/// Sends the final LogoutResponse to the party that asked for the logout.
#[async_trait]
pub trait LogoutBinding: Send + Sync {
    async fn send(
        &self,
        response: &LogoutResponse,
        context: &LogoutContext,
    ) -> LogoutResult<Delivery>;
}

/// Unconditional logout of an auth source, used when the session directory
/// cannot resolve the request.
#[async_trait]
pub trait SourceLogout: Send + Sync {
    async fn handle_logout(&self, auth_source: &str, issuer: &str) -> LogoutResult<()>;
}

/// External collaborators of the orchestrator
#[derive(Clone)]
pub struct LogoutCollaborators {
    pub parties: Arc<dyn PartyLogout>,
    pub binding: Arc<dyn LogoutBinding>,
    pub fallback: Arc<dyn SourceLogout>,
}

/// Result of one orchestration step
#[derive(Debug, Clone)]
pub enum LogoutStep {
    /// Browser goes to `party_id`; the flow continues when `token` comes back.
    Redirect {
        party_id: String,
        token: Uuid,
        delivery: Delivery,
    },
    /// Flow finished and the response was handed to the binding.
    Complete {
        response: LogoutResponse,
        logged_out: usize,
        delivery: Delivery,
    },
}

impl LogoutStep {
    #[must_use]
    pub fn phase(&self) -> LogoutPhase {
        match self {
            LogoutStep::Redirect { .. } => LogoutPhase::Dispatching,
            LogoutStep::Complete { .. } => LogoutPhase::Done,
        }
    }

    #[must_use]
    pub fn into_delivery(self) -> Delivery {
        match self {
            LogoutStep::Redirect { delivery, .. } | LogoutStep::Complete { delivery, .. } => {
                delivery
            }
        }
    }
}

/// Drives a logout across parties and invocations.
pub struct LogoutOrchestrator {
    collector: AssociationCollector,
    executor: LogoutExecutor,
    states: Arc<dyn LogoutStateStore>,
    collaborators: LogoutCollaborators,
    resume_url: Url,
    sweep_per_mille: u32,
}

impl LogoutOrchestrator {
    #[must_use]
    pub fn new(
        directory: SessionDirectory,
        sessions: Arc<dyn LocalSessionStore>,
        states: Arc<dyn LogoutStateStore>,
        collaborators: LogoutCollaborators,
        config: &LogoutConfig,
    ) -> Self {
        Self {
            collector: AssociationCollector::new(directory.clone(), sessions.clone()),
            executor: LogoutExecutor::new(directory, sessions),
            states,
            collaborators,
            resume_url: config.resume_url.clone(),
            sweep_per_mille: config.sweep_per_mille,
        }
    }

    /// Handle a freshly received LogoutRequest for `auth_source`.
    pub async fn begin(
        &self,
        auth_source: &str,
        request: LogoutRequest,
        context: LogoutContext,
    ) -> LogoutResult<LogoutStep> {
        tracing::info!(
            auth_source = %auth_source,
            issuer = %request.issuer,
            request_id = %request.id,
            session_indexes = request.session_indexes.len(),
            phase = %LogoutPhase::Init,
            "SAML LogoutRequest received"
        );

        if sweep_due(self.sweep_per_mille) {
            self.sweep_states().await;
        }

        let associations = self
            .collector
            .collect_associations(auth_source, &request.name_id, &request.session_indexes)
            .await?;
        let parties: Vec<String> = associations.party_ids().map(str::to_string).collect();

        tracing::debug!(
            auth_source = %auth_source,
            parties = parties.len(),
            "Collected logout associations"
        );

        let state = OrchestrationState::new(auth_source, request, context, parties);
        self.dispatch(state).await
    }

    /// Continue the flow saved under `token`. The token cannot be reused.
    pub async fn resume(&self, token: Uuid) -> LogoutResult<LogoutStep> {
        let state = self.states.load(token).await?;
        tracing::info!(
            token = %token,
            remaining = state.remaining_parties.len(),
            phase = %state.phase(),
            "Resuming SP logout"
        );
        self.dispatch(state).await
    }

    /// `resume` for a raw `id` parameter.
    pub async fn resume_from_param(&self, id: Option<&str>) -> LogoutResult<LogoutStep> {
        let raw = id
            .filter(|s| !s.is_empty())
            .ok_or(LogoutError::MissingResumeToken)?;
        let token =
            Uuid::parse_str(raw).map_err(|_| LogoutError::InvalidResumeToken(raw.to_string()))?;
        self.resume(token).await
    }

    async fn dispatch(&self, state: OrchestrationState) -> LogoutResult<LogoutStep> {
        let Some((party_id, next)) = state.next_party() else {
            return self.respond(state).await;
        };

        let token = self.states.save(&next).await?;
        let return_url = self.resume_url_for(token);
        let delivery = self
            .collaborators
            .parties
            .logout_redirect(&party_id, &return_url)
            .await?;

        tracing::info!(
            party_id = %party_id,
            token = %token,
            remaining = next.remaining_parties.len(),
            phase = %LogoutPhase::Dispatching,
            "Redirecting to party for logout"
        );

        Ok(LogoutStep::Redirect {
            party_id,
            token,
            delivery,
        })
    }

    async fn respond(&self, state: OrchestrationState) -> LogoutResult<LogoutStep> {
        let OrchestrationState {
            auth_source,
            original_request: request,
            context,
            ..
        } = state;
        let requested = request.session_indexes.len();

        let logged_out = match self
            .executor
            .logout_sessions(&auth_source, &request.name_id, &request.session_indexes)
            .await?
        {
            LogoutCount::Terminated(count) => count,
            LogoutCount::Unsupported => {
                tracing::info!(
                    auth_source = %auth_source,
                    "Session directory cannot resolve request, logging out of auth source"
                );
                self.collaborators
                    .fallback
                    .handle_logout(&auth_source, &request.issuer)
                    .await?;
                requested
            }
        };

        let response = LogoutResponse::success(generate_id(), &request, &context);

        if logged_out < requested {
            tracing::warn!(
                auth_source = %auth_source,
                request_id = %request.id,
                "Logged out of {} of {} sessions",
                logged_out,
                requested
            );
        }

        let delivery = self.collaborators.binding.send(&response, &context).await?;

        tracing::info!(
            auth_source = %auth_source,
            in_response_to = %response.in_response_to,
            logged_out = logged_out,
            phase = %LogoutPhase::Done,
            "SAML LogoutResponse sent"
        );

        Ok(LogoutStep::Complete {
            response,
            logged_out,
            delivery,
        })
    }

    async fn sweep_states(&self) {
        match self.states.cleanup_expired().await {
            Ok(deleted) if deleted > 0 => {
                tracing::debug!(deleted = deleted, "Purged stale logout states");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to purge stale logout states"),
        }
    }

    fn resume_url_for(&self, token: Uuid) -> Url {
        let mut url = self.resume_url.clone();
        url.query_pairs_mut().append_pair("id", &token.to_string());
        url
    }
}
