use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use be_authz::error_response;
use be_remote_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid request body")]
    MalformedBody(#[from] JsonRejection),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for CatalogError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => CatalogError::NotFound(entity),
            DbError::Duplicate { value, .. } => {
                CatalogError::Conflict(format!("{value} already exists"))
            }
            DbError::ForeignKeyViolation { .. } => {
                CatalogError::Conflict("Record is still referenced by other records".to_string())
            }
            other => CatalogError::Database(other),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            CatalogError::InvalidInput(_) => (StatusCode::BAD_REQUEST, None),
            CatalogError::MalformedBody(rejection) => {
                (StatusCode::BAD_REQUEST, Some(rejection.body_text()))
            }
            CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            CatalogError::Conflict(_) => (StatusCode::CONFLICT, None),
            CatalogError::Database(e) => {
                tracing::error!(error = %e, "Catalog database error");
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
