use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use be_authz::error_response;
use be_remote_db::DbError;
use be_storage::StorageError;

use crate::validator::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid request body")]
    MalformedBody(#[from] JsonRejection),

    #[error("Invalid query string")]
    MalformedQuery(#[from] QueryRejection),

    #[error("Invalid multipart form")]
    MalformedForm(#[from] MultipartRejection),

    #[error("Invalid multipart form")]
    Multipart(#[from] MultipartError),

    /// Missing rows and rows owned by someone else look the same to callers.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Single-card reads report a missing card as 404.
    #[error("Card not found")]
    CardNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Unsupported photo type: {0}")]
    UnsupportedPhoto(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for CardError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => CardError::NotFound(entity),
            DbError::Duplicate { field: "favorite", .. } => {
                CardError::Conflict("Card is already in favorites".to_string())
            }
            err if err.references("category") => CardError::NotFound("category"),
            err if err.references("tariff") => CardError::NotFound("tariff"),
            other => CardError::Database(other),
        }
    }
}

impl From<StorageError> for CardError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedMediaType(mime) => CardError::UnsupportedPhoto(mime),
            other => CardError::Storage(other),
        }
    }
}

impl IntoResponse for CardError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            CardError::Validation(_)
            | CardError::NotFound(_)
            | CardError::UnsupportedPhoto(_) => (StatusCode::BAD_REQUEST, None),
            CardError::MalformedBody(rejection) => {
                (StatusCode::BAD_REQUEST, Some(rejection.body_text()))
            }
            CardError::MalformedQuery(rejection) => {
                (StatusCode::BAD_REQUEST, Some(rejection.body_text()))
            }
            CardError::MalformedForm(rejection) => {
                (StatusCode::BAD_REQUEST, Some(rejection.body_text()))
            }
            CardError::Multipart(err) => (StatusCode::BAD_REQUEST, Some(err.body_text())),
            CardError::CardNotFound => (StatusCode::NOT_FOUND, None),
            CardError::Conflict(_) => (StatusCode::CONFLICT, None),
            CardError::Storage(e) => {
                tracing::error!(error = %e, "Photo storage error");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to store photos",
                    Some(e.to_string()),
                );
            }
            CardError::Database(e) => {
                tracing::error!(error = %e, "Card database error");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    Some(e.to_string()),
                );
            }
        };

        error_response(status, self.to_string(), detail)
    }
}
