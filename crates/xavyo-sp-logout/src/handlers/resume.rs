//! Resume endpoint for multi-party SP logout.
//!
//! Each party visited during a logout sends the browser back here with the
//! single-use `id` token that was handed out before the redirect.

use crate::error::LogoutResult;
use crate::services::{LogoutOrchestrator, LogoutStep};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

/// Shared state for SP logout handlers
#[derive(Clone)]
pub struct SpLogoutState {
    pub orchestrator: Arc<LogoutOrchestrator>,
}

impl SpLogoutState {
    #[must_use]
    pub fn new(orchestrator: LogoutOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Query parameters for the resume endpoint
#[derive(Debug, Deserialize)]
pub struct ResumeQuery {
    /// Token saved before the last party redirect
    pub id: Option<String>,
}

/// Continue a logout after a party redirect
///
/// GET /saml/sp/logout/resume?id=<token>
pub async fn resume_logout(
    State(state): State<SpLogoutState>,
    Query(query): Query<ResumeQuery>,
) -> Response {
    match handle_resume(&state, query).await {
        Ok(step) => step.into_delivery().into_response(),
        Err(e) => {
            if e.is_bad_request() {
                tracing::warn!(error = %e, "SP logout resume rejected");
            } else {
                tracing::error!(error = %e, "SP logout resume failed");
            }
            e.into_response()
        }
    }
}

async fn handle_resume(state: &SpLogoutState, query: ResumeQuery) -> LogoutResult<LogoutStep> {
    state
        .orchestrator
        .resume_from_param(query.id.as_deref())
        .await
}
