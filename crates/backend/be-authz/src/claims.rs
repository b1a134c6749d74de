use auth_core::Claims;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::AuthzError;

/// Claims of the caller, placed in request extensions by the authz middleware.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> i64 {
        self.0.user_id
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or(AuthzError::Unauthenticated)
    }
}
