//! Logout protocol values exchanged with the binding layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SAML status code for a successful logout.
pub const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Federated subject identifier presented by a remote party.
///
/// Every field participates in the identity hash, so the same value under a
/// different format or qualifier is a different identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_provided_id: Option<String>,
}

impl NameId {
    /// A `NameId` with only a value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
            sp_provided_id: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Inbound LogoutRequest, already parsed and validated by the binding layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Request ID, echoed as `InResponseTo`
    pub id: String,
    /// Entity ID of the party that sent the request
    pub issuer: String,
    pub name_id: NameId,
    /// Session indexes named by the request; empty means "all sessions"
    #[serde(default)]
    pub session_indexes: Vec<String>,
    #[serde(default)]
    pub relay_state: Option<String>,
}

/// Opaque values the binding layer needs to build and send the final response.
///
/// Round-tripped unchanged through every persisted step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogoutContext {
    #[serde(default)]
    pub local_metadata: serde_json::Value,
    #[serde(default)]
    pub remote_metadata: serde_json::Value,
    #[serde(default)]
    pub binding: serde_json::Value,
}

impl LogoutContext {
    /// Entity ID of the local SP, if the metadata carries one.
    #[must_use]
    pub fn local_entity_id(&self) -> Option<&str> {
        self.local_metadata.get("entityid").and_then(|v| v.as_str())
    }
}

/// Outbound LogoutResponse correlated with the original request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub id: String,
    pub in_response_to: String,
    pub relay_state: Option<String>,
    pub issuer: Option<String>,
    pub issue_instant: DateTime<Utc>,
    pub status: String,
}

impl LogoutResponse {
    /// Build a success response for `request`.
    ///
    /// The relay state is copied verbatim.
    #[must_use]
    pub fn success(id: String, request: &LogoutRequest, context: &LogoutContext) -> Self {
        Self {
            id,
            in_response_to: request.id.clone(),
            relay_state: request.relay_state.clone(),
            issuer: context.local_entity_id().map(str::to_string),
            issue_instant: Utc::now(),
            status: STATUS_SUCCESS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> LogoutRequest {
        LogoutRequest {
            id: "_req-1".to_string(),
            issuer: "https://idp.example.com".to_string(),
            name_id: NameId::new("alice@example.com"),
            session_indexes: vec!["abc".to_string()],
            relay_state: Some("https://app.example.com/bye?x=1&y=2".to_string()),
        }
    }

    #[test]
    fn test_success_response_correlates_request() {
        let context = LogoutContext {
            local_metadata: json!({ "entityid": "https://sp.example.com" }),
            ..LogoutContext::default()
        };
        let response = LogoutResponse::success("_resp-1".to_string(), &request(), &context);

        assert_eq!(response.in_response_to, "_req-1");
        assert_eq!(
            response.relay_state.as_deref(),
            Some("https://app.example.com/bye?x=1&y=2")
        );
        assert_eq!(response.issuer.as_deref(), Some("https://sp.example.com"));
        assert_eq!(response.status, STATUS_SUCCESS);
    }

    #[test]
    fn test_response_without_local_metadata() {
        let response =
            LogoutResponse::success("_resp-1".to_string(), &request(), &LogoutContext::default());
        assert!(response.issuer.is_none());
    }
}
