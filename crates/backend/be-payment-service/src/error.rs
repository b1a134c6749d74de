use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use be_authz::error_response;
use be_remote_db::DbError;

/// Errors of the client-facing payment endpoints. The gateway webhook has
/// its own error envelope, see [`crate::rpc::WebhookError`].
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid query string")]
    MalformedQuery(#[from] QueryRejection),

    /// Also returned when the card belongs to someone else.
    #[error("Card not found")]
    CardNotFound,

    #[error("{0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            PaymentError::InvalidInput(_)
            | PaymentError::CardNotFound
            | PaymentError::NotFound(_) => (StatusCode::BAD_REQUEST, None),
            PaymentError::MalformedQuery(rejection) => {
                (StatusCode::BAD_REQUEST, Some(rejection.body_text()))
            }
            PaymentError::Config(_) | PaymentError::Database(_) => {
                tracing::error!(error = %self, "Payment service error");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    Some(self.to_string()),
                );
            }
        };

        error_response(status, self.to_string(), detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_400() {
        for err in [
            PaymentError::InvalidInput("cardId and type are required".into()),
            PaymentError::CardNotFound,
            PaymentError::NotFound("Tariff 3 not found".into()),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn database_errors_are_500() {
        let err = PaymentError::from(DbError::Pool("closed".into()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
