//! How a protocol message leaves this service

use axum::response::{Html, IntoResponse, Redirect, Response};
use url::Url;

/// Delivery produced by a binding or party collaborator.
///
/// The HTTP layer turns it into a `303 See Other` or an auto-submitting form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// HTTP-Redirect binding
    Redirect(Url),
    /// HTTP-POST binding: hidden form fields posted to `destination`
    Post {
        destination: Url,
        fields: Vec<(String, String)>,
    },
}

impl IntoResponse for Delivery {
    fn into_response(self) -> Response {
        match self {
            Delivery::Redirect(location) => Redirect::to(location.as_str()).into_response(),
            Delivery::Post {
                destination,
                fields,
            } => Html(generate_auto_submit_form(destination.as_str(), &fields)).into_response(),
        }
    }
}

/// Auto-submit form HTML posting `fields` to `destination`
#[must_use]
pub fn generate_auto_submit_form(destination: &str, fields: &[(String, String)]) -> String {
    let inputs: String = fields
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}"/>"#,
                html_escape(name),
                html_escape(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>SAML Logout</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="POST" action="{}">
        {}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
        html_escape(destination),
        inputs
    )
}

/// HTML escape for XSS prevention
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
