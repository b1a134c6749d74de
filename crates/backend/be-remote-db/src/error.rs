//! Error types for the marketplace database layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity} not found{}", .id.as_ref().map(|id| format!(": {}", id)).unwrap_or_default())]
    NotFound {
        entity: &'static str,
        id: Option<String>,
    },

    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("Row is still referenced or references a missing row ({constraint})")]
    ForeignKeyViolation { constraint: String },

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity, id: None }
    }

    pub fn not_found_with_id(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: Some(id.to_string()),
        }
    }

    pub fn duplicate(field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            field,
            value: value.into(),
        }
    }

    /// True when the violated foreign key mentions `name`, e.g. `cards_tariff_id_fkey`.
    pub fn references(&self, name: &str) -> bool {
        matches!(self, Self::ForeignKeyViolation { constraint } if constraint.contains(name))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "record",
                id: None,
            },
            sqlx::Error::Database(db_err) => {
                // 23505 = unique_violation, 23503 = foreign_key_violation
                match db_err.code().as_deref() {
                    Some("23505") => Self::Duplicate {
                        field: "constraint",
                        value: db_err.constraint().unwrap_or("unknown").to_string(),
                    },
                    Some("23503") => Self::ForeignKeyViolation {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    },
                    _ => Self::Database(sqlx::Error::Database(db_err)),
                }
            }
            sqlx::Error::PoolTimedOut => Self::Pool("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::Io(io_err) => Self::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => Self::Connection(format!("TLS error: {}", tls_err)),
            other => Self::Database(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
