//! SP logout route definitions

use crate::handlers::{resume_logout, SpLogoutState};
use axum::{routing::get, Router};

/// Path parties redirect back to between logout steps
pub const RESUME_PATH: &str = "/saml/sp/logout/resume";

/// Create the SP logout router
pub fn sp_logout_router(state: SpLogoutState) -> Router {
    Router::new()
        .route(RESUME_PATH, get(resume_logout))
        .with_state(state)
}
