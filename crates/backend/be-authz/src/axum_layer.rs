use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use be_auth_core::JwtConfig;
use tracing::{debug, warn};

use crate::{AuthzError, bypass::is_public_route};

/// Shared state for the axum authz middleware.
#[derive(Debug)]
pub struct AuthzState {
    pub jwt_config: JwtConfig,
}

impl AuthzState {
    pub fn new(jwt_config: JwtConfig) -> Self {
        Self { jwt_config }
    }
}

/// The token travels verbatim in `Authorization`; a `Bearer ` scheme is accepted too.
fn token_from_header(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.strip_prefix("Bearer") {
        Some("") => return None,
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Axum middleware that validates the access token on every non-public route
/// and stores its [`auth_core::Claims`] in request extensions.
pub async fn authz_middleware(
    State(state): State<Arc<AuthzState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_public_route(req.method().as_str(), req.uri().path()) {
        debug!(path = %req.uri().path(), "Bypassing authorization for public route");
        return next.run(req).await;
    }

    let Some(token) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_header)
    else {
        return AuthzError::MissingToken.into_response();
    };

    match state.jwt_config.validate_access_token(token) {
        Ok(claims) => {
            debug!(user_id = claims.user_id, path = %req.uri().path(), "Request authorized");
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            warn!(path = %req.uri().path(), error = %e, "Rejected access token");
            AuthzError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthUser;
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn jwt() -> JwtConfig {
        JwtConfig::from_secret(&SecretString::from("authz-test-secret"))
    }

    fn app() -> Router {
        let state = Arc::new(AuthzState::new(jwt()));
        Router::new()
            .route("/api/profile", get(|user: AuthUser| async move { user.user_id().to_string() }))
            .route("/health", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, authz_middleware))
    }

    async fn status_and_body(req: axum::http::Request<Body>) -> (StatusCode, String) {
        let resp = app().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(token_from_header("abc.def"), Some("abc.def"));
        assert_eq!(token_from_header("Bearer abc.def"), Some("abc.def"));
        assert_eq!(token_from_header("Bearer "), None);
        assert_eq!(token_from_header("  Bearer  "), None);
        assert_eq!(token_from_header("Bearer  abc.def "), Some("abc.def"));
        assert_eq!(token_from_header("Bearerabc.def"), Some("Bearerabc.def"));
        assert_eq!(token_from_header(""), None);
    }

    #[tokio::test]
    async fn public_route_needs_no_token() {
        let req = axum::http::Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = status_and_body(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn missing_token_is_401_with_uniform_body() {
        let req = axum::http::Request::get("/api/profile").body(Body::empty()).unwrap();
        let (status, body) = status_and_body(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["message"], "Missing authorization header");
    }

    #[tokio::test]
    async fn verbatim_token_reaches_handler() {
        let token = jwt().issue_token(17, "owner@example.com").unwrap();
        let req = axum::http::Request::get("/api/profile")
            .header(AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap();
        let (status, body) = status_and_body(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "17");
    }

    #[tokio::test]
    async fn token_from_other_secret_is_rejected() {
        let other = JwtConfig::from_secret(&SecretString::from("someone-else"));
        let token = other.issue_token(17, "owner@example.com").unwrap();
        let req = axum::http::Request::get("/api/profile")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = status_and_body(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
