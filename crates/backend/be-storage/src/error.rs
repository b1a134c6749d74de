//! Error types for photo storage

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Failed to prepare photo directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage operation failed: {0}")]
    OpenDal(#[from] opendal::Error),

    #[error("Unsupported photo type: {0}")]
    UnsupportedMediaType(String),
}

impl StorageError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn missing_env_var(var_name: impl Into<String>) -> Self {
        Self::MissingEnvVar(var_name.into())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
