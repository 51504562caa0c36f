use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_http::request_id::RequestId;

use super::auth::AuthUser;

/// Per-request facts handlers attach to problem objects and audit
/// metadata: the request URI, its id, and the authenticated user.
pub struct RequestContext {
    pub instance: String,
    pub request_id: String,
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .unwrap_or_default()
            .to_string();
        let username = parts
            .extensions
            .get::<AuthUser>()
            .map(|user| user.0.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        Ok(Self {
            instance: parts.uri.to_string(),
            request_id,
            username,
        })
    }
}
