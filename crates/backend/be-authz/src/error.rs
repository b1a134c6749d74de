use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use be_auth_core::TokenError;
use serde::Serialize;

/// Uniform JSON error body returned by every HTTP endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: Option<String>,
    pub status: bool,
}

/// Builds the error response; `detail` is only exposed in debug builds.
pub fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    detail: Option<String>,
) -> Response {
    let body = ErrorBody {
        message: message.into(),
        error: detail.filter(|_| cfg!(debug_assertions)),
        status: false,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Missing authorization header")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Request was not authenticated")]
    Unauthenticated,
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let detail = match &self {
            AuthzError::Token(TokenError::Invalid(err)) => Some(err.to_string()),
            _ => None,
        };
        error_response(StatusCode::UNAUTHORIZED, self.to_string(), detail)
    }
}
