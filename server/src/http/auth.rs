//! Basic auth on a configurable realm, credentials from a JSON map.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::state::AppState;

/// The authenticated user name, stored as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

pub struct Authenticator {
    realm: String,
    credentials: HashMap<String, String>,
}

impl Authenticator {
    /// `raw_credentials` is a JSON object mapping users to passwords.
    /// A malformed map yields an authenticator that rejects everyone.
    pub fn new(realm: impl Into<String>, raw_credentials: &str) -> Self {
        let credentials = match serde_json::from_str(raw_credentials) {
            Ok(credentials) => credentials,
            Err(err) => {
                warn!(%err, "could not parse auth credentials, rejecting all requests");
                HashMap::new()
            }
        };
        Self {
            realm: realm.into(),
            credentials,
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn verify(&self, user: &str, password: &str) -> bool {
        let Some(expected) = self.credentials.get(user) else {
            return false;
        };
        expected.as_bytes().ct_eq(password.as_bytes()).into()
    }
}

pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match header.and_then(parse_basic) {
        Some((user, password)) if state.auth.verify(&user, &password) => {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
        _ => {
            warn!(realm = %state.auth.realm(), "unauthorized request");
            unauthorized(state.auth.realm())
        }
    }
}

fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn unauthorized(realm: &str) -> Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{realm}\"")) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_checks_user_and_password() {
        let auth = Authenticator::new("nbox", r#"{"alice":"secret"}"#);
        assert!(auth.verify("alice", "secret"));
        assert!(!auth.verify("alice", "wrong"));
        assert!(!auth.verify("bob", "secret"));
    }

    #[test]
    fn malformed_credentials_reject_everyone() {
        let auth = Authenticator::new("nbox", "not json");
        assert!(!auth.verify("alice", "secret"));
    }

    #[test]
    fn parse_basic_decodes_the_header() {
        // "alice:secret"
        let parsed = parse_basic("Basic YWxpY2U6c2VjcmV0");
        assert_eq!(
            parsed,
            Some(("alice".to_string(), "secret".to_string()))
        );
        assert!(parse_basic("Bearer token").is_none());
    }
}
