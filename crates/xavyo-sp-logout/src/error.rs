//! Error types for SP Single Logout

use crate::session::{DirectoryError, SessionStoreError};
use crate::state::StateError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for SP logout operations
pub type LogoutResult<T> = Result<T, LogoutError>;

/// Errors raised while tracking or orchestrating a logout
#[derive(Debug, Error)]
pub enum LogoutError {
    /// Resume endpoint called without an `id` parameter
    #[error("Missing id-parameter")]
    MissingResumeToken,

    /// Resume token is not a well-formed token
    #[error("Invalid resume token: {0}")]
    InvalidResumeToken(String),

    /// Persisted orchestration state could not be loaded or saved
    #[error(transparent)]
    State(#[from] StateError),

    /// Session directory backend failure
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Local session collaborator failure
    #[error(transparent)]
    LocalSession(#[from] SessionStoreError),

    /// A party could not be asked to log out
    #[error("Failed to start logout at party {party_id}: {message}")]
    PartyLogoutFailed { party_id: String, message: String },

    /// The final response could not be delivered
    #[error("Failed to deliver LogoutResponse: {0}")]
    BindingFailed(String),

    /// Unconditional single-source logout failed
    #[error("Fallback logout failed: {0}")]
    FallbackFailed(String),
}

impl LogoutError {
    /// Whether the caller sent something unusable (as opposed to a server fault).
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        match self {
            LogoutError::MissingResumeToken | LogoutError::InvalidResumeToken(_) => true,
            LogoutError::State(e) => !matches!(
                e,
                StateError::StorageError(_) | StateError::Serialization(_)
            ),
            _ => false,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_status: Option<String>,
}

const STATUS_REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";
const STATUS_RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";

impl IntoResponse for LogoutError {
    fn into_response(self) -> Response {
        let (status, error_code, saml_status) = match &self {
            LogoutError::MissingResumeToken => {
                (StatusCode::BAD_REQUEST, "missing_id", Some(STATUS_REQUESTER))
            }
            LogoutError::InvalidResumeToken(_) => {
                (StatusCode::BAD_REQUEST, "invalid_id", Some(STATUS_REQUESTER))
            }
            LogoutError::State(e) => match e {
                StateError::NotFound(_) => (
                    StatusCode::BAD_REQUEST,
                    "unknown_logout_state",
                    Some(STATUS_REQUESTER),
                ),
                StateError::Expired { .. } => (
                    StatusCode::BAD_REQUEST,
                    "logout_state_expired",
                    Some(STATUS_REQUESTER),
                ),
                StateError::AlreadyConsumed { .. } => (
                    StatusCode::BAD_REQUEST,
                    "logout_state_reused",
                    Some(STATUS_REQUESTER),
                ),
                StateError::StorageError(_) | StateError::Serialization(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "logout_state_storage_error",
                    Some(STATUS_RESPONDER),
                ),
            },
            LogoutError::Directory(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "session_directory_error",
                Some(STATUS_RESPONDER),
            ),
            LogoutError::LocalSession(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "local_session_error",
                Some(STATUS_RESPONDER),
            ),
            LogoutError::PartyLogoutFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "party_logout_failed", None)
            }
            LogoutError::BindingFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "binding_failed",
                Some(STATUS_RESPONDER),
            ),
            LogoutError::FallbackFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "fallback_logout_failed",
                Some(STATUS_RESPONDER),
            ),
        };

        let message = match &self {
            LogoutError::Directory(e) => {
                tracing::error!(error = %e, "SP logout directory error");
                "A session directory error occurred".to_string()
            }
            LogoutError::LocalSession(e) => {
                tracing::error!(error = %e, "SP logout local session error");
                "A session error occurred".to_string()
            }
            LogoutError::State(e) if !self.is_bad_request() => {
                tracing::error!(error = %e, "SP logout state storage error");
                "A logout state storage error occurred".to_string()
            }
            LogoutError::BindingFailed(msg) | LogoutError::FallbackFailed(msg) => {
                tracing::error!("SP logout internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            // Safe user-facing messages (contain only client-provided values)
            LogoutError::MissingResumeToken
            | LogoutError::InvalidResumeToken(_)
            | LogoutError::State(_)
            | LogoutError::PartyLogoutFailed { .. } => self.to_string(),
        };

        let body = ErrorResponse {
            error: error_code.to_string(),
            message,
            saml_status: saml_status.map(String::from),
        };

        (status, Json(body)).into_response()
    }
}
