//! Shared fixtures for xavyo-sp-logout integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Arc, Once};
use tokio::sync::Mutex;
use url::Url;
use xavyo_sp_logout::error::LogoutResult;
use xavyo_sp_logout::services::Associations;
use xavyo_sp_logout::{
    Delivery, InMemoryLocalSessionStore, InMemoryStateStore, LocalSession, LogoutBinding,
    LogoutCollaborators, LogoutConfig, LogoutContext, LogoutOrchestrator, LogoutRequest,
    LogoutResponse, NameId, PartyLogout, SessionDirectory, SourceLogout,
};

static INIT: Once = Once::new();

pub const RESUME_URL: &str = "https://sp.example.com/saml/sp/logout/resume";
pub const ISSUER: &str = "https://idp.example.com";
pub const RESPONSE_DESTINATION: &str = "https://idp.example.com/slo/response";

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub fn alice() -> NameId {
    NameId::new("alice@example.com")
        .with_format("urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress")
}

pub fn logout_request(indexes: &[&str]) -> LogoutRequest {
    LogoutRequest {
        id: "_req-7f3a".to_string(),
        issuer: ISSUER.to_string(),
        name_id: alice(),
        session_indexes: indexes.iter().map(|s| (*s).to_string()).collect(),
        relay_state: Some("https://app.example.com/bye".to_string()),
    }
}

/// Parties bounce the browser straight back to the resume URL; the binding
/// posts the response to a fixed destination.
#[derive(Default)]
pub struct FakeParties {
    pub visited: Mutex<Vec<String>>,
    pub responses: Mutex<Vec<LogoutResponse>>,
    pub fallbacks: Mutex<Vec<String>>,
}

#[async_trait]
impl PartyLogout for FakeParties {
    async fn logout_redirect(&self, party_id: &str, return_url: &Url) -> LogoutResult<Delivery> {
        self.visited.lock().await.push(party_id.to_string());
        Ok(Delivery::Redirect(return_url.clone()))
    }
}

#[async_trait]
impl LogoutBinding for FakeParties {
    async fn send(
        &self,
        response: &LogoutResponse,
        _context: &LogoutContext,
    ) -> LogoutResult<Delivery> {
        self.responses.lock().await.push(response.clone());
        let mut fields = vec![("SAMLResponse".to_string(), response.id.clone())];
        if let Some(relay_state) = &response.relay_state {
            fields.push(("RelayState".to_string(), relay_state.clone()));
        }
        Ok(Delivery::Post {
            destination: Url::parse(RESPONSE_DESTINATION).unwrap(),
            fields,
        })
    }
}

#[async_trait]
impl SourceLogout for FakeParties {
    async fn handle_logout(&self, auth_source: &str, _issuer: &str) -> LogoutResult<()> {
        self.fallbacks.lock().await.push(auth_source.to_string());
        Ok(())
    }
}

pub struct TestContext {
    pub directory: SessionDirectory,
    pub sessions: Arc<InMemoryLocalSessionStore>,
    pub parties: Arc<FakeParties>,
    pub orchestrator: Arc<LogoutOrchestrator>,
}

impl TestContext {
    pub fn new(directory: SessionDirectory) -> Self {
        init_test_logging();

        let sessions = Arc::new(InMemoryLocalSessionStore::new());
        let parties = Arc::new(FakeParties::default());
        let config = LogoutConfig::new(Url::parse(RESUME_URL).unwrap());
        let orchestrator = LogoutOrchestrator::new(
            directory.clone(),
            sessions.clone(),
            Arc::new(InMemoryStateStore::new()),
            LogoutCollaborators {
                parties: parties.clone(),
                binding: parties.clone(),
                fallback: parties.clone(),
            },
            &config,
        );

        Self {
            directory,
            sessions,
            parties,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Log alice in to `idp1` with local session `local_id`.
    pub async fn login(&self, index: Option<&str>, local_id: &str, associations: Associations) {
        let expires_at = Utc::now() + Duration::hours(1);
        self.sessions
            .insert(
                LocalSession::new(local_id)
                    .authenticated("idp1", expires_at)
                    .with_associations(associations),
            )
            .await;
        self.directory
            .register_session("idp1", &alice(), index, expires_at, local_id)
            .await
            .unwrap();
    }
}
