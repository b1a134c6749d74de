use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use be_authz::{TokenError, error_response};
use be_remote_db::DbError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    // 400
    #[error("{0}")]
    InvalidInput(String),
    #[error("Invalid request body")]
    MalformedBody(#[from] JsonRejection),
    #[error("Invalid email or password")]
    InvalidCredentials,

    // 404
    #[error("User not found")]
    UserNotFound,

    // 409
    #[error("Email already exists")]
    EmailExists,

    // 500
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Token generation failed: {0}")]
    Token(#[from] TokenError),
    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate { .. } => AuthError::EmailExists,
            other => AuthError::Database(other),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match &self {
            AuthError::InvalidInput(_) | AuthError::InvalidCredentials => {
                (StatusCode::BAD_REQUEST, self.to_string(), None)
            }
            AuthError::MalformedBody(rejection) => (
                StatusCode::BAD_REQUEST,
                self.to_string(),
                Some(rejection.body_text()),
            ),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, self.to_string(), None),
            AuthError::EmailExists => (StatusCode::CONFLICT, self.to_string(), None),
            AuthError::PasswordHash(msg) => {
                error!("Password hashing error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication error".to_string(),
                    Some(msg.clone()),
                )
            }
            AuthError::Token(e) => {
                error!("Token generation error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Token generation error".to_string(),
                    Some(e.to_string()),
                )
            }
            AuthError::Database(e) => {
                error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(e.to_string()),
                )
            }
        };

        error_response(status, message, detail)
    }
}
