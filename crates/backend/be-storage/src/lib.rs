//! Photo storage for card listings, backed by OpenDAL.
//!
//! Photos are written under a content-addressed path
//! (`cards/<user_id>/<sha256>.<ext>`) and exposed to clients through a public
//! base URL, so the same image uploaded twice by one user maps to one object.
//!
//! ## Environment Variables
//!
//! - `PHOTO_STORAGE_BACKEND`: Either "fs" (default) or "s3"
//! - `PHOTO_PUBLIC_BASE_URL`: Prefix joined with the object path to build the
//!   URL stored on cards (default: "/uploads")
//!
//! ### For filesystem backend:
//! - `PHOTO_STORAGE_FS_ROOT`: Root directory for file storage (default: "./uploads")
//!
//! ### For S3 backend:
//! - `PHOTO_STORAGE_S3_BUCKET`: S3 bucket name (required)
//! - `PHOTO_STORAGE_S3_REGION`: S3 region (required)
//! - `PHOTO_STORAGE_S3_ENDPOINT`: S3 endpoint URL (optional, for S3-compatible services)
//! - `PHOTO_STORAGE_S3_ACCESS_KEY_ID`: access key ID (optional)
//! - `PHOTO_STORAGE_S3_SECRET_ACCESS_KEY`: secret access key (optional)

mod error;

pub use error::{StorageError, StorageResult};

use bon::bon;
use opendal::{Operator, services};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

pub const DEFAULT_FS_ROOT: &str = "./uploads";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "/uploads";

#[derive(Debug, Clone)]
pub enum StorageBackend {
    FS {
        root: String,
    },
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<SecretString>,
    },
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::FS {
                root: DEFAULT_FS_ROOT.to_string(),
            },
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
        }
    }
}

impl StorageConfig {
    /// Create configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MissingEnvVar` if required environment variables
    /// are not set when using S3 backend.
    pub fn from_env() -> StorageResult<Self> {
        let backend = std::env::var("PHOTO_STORAGE_BACKEND")
            .unwrap_or_else(|_| "fs".to_string())
            .to_lowercase();

        let backend = match backend.as_str() {
            "s3" => StorageBackend::S3 {
                bucket: std::env::var("PHOTO_STORAGE_S3_BUCKET")
                    .map_err(|_| StorageError::missing_env_var("PHOTO_STORAGE_S3_BUCKET"))?,
                region: std::env::var("PHOTO_STORAGE_S3_REGION")
                    .map_err(|_| StorageError::missing_env_var("PHOTO_STORAGE_S3_REGION"))?,
                endpoint: std::env::var("PHOTO_STORAGE_S3_ENDPOINT").ok(),
                access_key_id: std::env::var("PHOTO_STORAGE_S3_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("PHOTO_STORAGE_S3_SECRET_ACCESS_KEY")
                    .ok()
                    .map(SecretString::from),
            },
            "fs" => StorageBackend::FS {
                root: std::env::var("PHOTO_STORAGE_FS_ROOT")
                    .unwrap_or_else(|_| DEFAULT_FS_ROOT.to_string()),
            },
            other => {
                return Err(StorageError::configuration(format!(
                    "unknown PHOTO_STORAGE_BACKEND '{other}', expected 'fs' or 's3'"
                )));
            }
        };

        let public_base_url = std::env::var("PHOTO_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_string());

        Ok(Self {
            backend,
            public_base_url,
        })
    }

    /// Local directory to serve uploads from, when the backend is the filesystem.
    pub fn fs_root(&self) -> Option<&str> {
        match &self.backend {
            StorageBackend::FS { root } => Some(root.as_str()),
            StorageBackend::S3 { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

#[bon]
impl StorageService {
    /// Create a new storage service with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operator cannot be created.
    #[builder]
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let operator = Self::create_operator(&config.backend)?;
        Ok(Self { operator, config })
    }

    pub fn from_env() -> StorageResult<Self> {
        let config = StorageConfig::from_env()?;
        info!(
            backend = config.backend_name(),
            public_base_url = %config.public_base_url,
            "Initializing photo storage"
        );
        Self::builder().config(config).build()
    }

    fn create_operator(backend: &StorageBackend) -> StorageResult<Operator> {
        match backend {
            StorageBackend::FS { root } => {
                debug!("Creating filesystem storage operator with root: {}", root);

                std::fs::create_dir_all(root)?;

                let builder = services::Fs::default().root(root);

                Ok(Operator::new(builder)?.finish())
            }
            StorageBackend::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
            } => {
                debug!("Creating S3 storage operator for bucket: {}", bucket);

                let mut builder = services::S3::default().bucket(bucket).region(region);

                if let Some(ep) = endpoint {
                    builder = builder.endpoint(ep);
                }

                if let Some(key_id) = access_key_id {
                    builder = builder.access_key_id(key_id);
                }

                if let Some(secret) = secret_access_key {
                    builder = builder.secret_access_key(secret.expose_secret());
                }

                Ok(Operator::new(builder)?.finish())
            }
        }
    }

    pub fn content_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    pub fn photo_path(user_id: i64, content: &[u8], extension: &str) -> String {
        format!(
            "cards/{}/{}.{}",
            user_id,
            Self::content_hash(content),
            extension
        )
    }

    /// Only image types are accepted as card photos.
    pub fn extension_from_mime(mime_type: &str) -> Option<&'static str> {
        match mime_type {
            "image/png" => Some("png"),
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            "image/bmp" => Some("bmp"),
            "image/heic" => Some("heic"),
            _ => None,
        }
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            path
        )
    }

    /// Maps a URL produced by [`Self::public_url`] back to its object path.
    pub fn path_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.config.public_base_url.trim_end_matches('/'))
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|path| !path.is_empty() && !path.split('/').any(|seg| seg == ".."))
    }

    /// Store one photo and return the public URL to persist on the card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnsupportedMediaType` for non-image content and
    /// `StorageError::OpenDal` if the write fails.
    pub async fn upload_photo(
        &self,
        user_id: i64,
        content: &[u8],
        mime_type: &str,
    ) -> StorageResult<String> {
        let extension = Self::extension_from_mime(mime_type)
            .ok_or_else(|| StorageError::UnsupportedMediaType(mime_type.to_string()))?;
        let path = Self::photo_path(user_id, content, extension);

        debug!(user_id, %path, bytes = content.len(), "Uploading photo");

        self.operator.write(&path, content.to_vec()).await?;

        Ok(self.public_url(&path))
    }

    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        match self.operator.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

impl StorageConfig {
    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            StorageBackend::S3 { .. } => "s3",
            StorageBackend::FS { .. } => "fs",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs_service(root: &std::path::Path) -> StorageService {
        StorageService::builder()
            .config(StorageConfig {
                backend: StorageBackend::FS {
                    root: root.to_string_lossy().into_owned(),
                },
                public_base_url: "/uploads/".to_string(),
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            StorageService::content_hash(b"Hello, World!"),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_photo_path_is_content_addressed() {
        let a = StorageService::photo_path(7, b"same", "png");
        let b = StorageService::photo_path(7, b"same", "png");
        let other_user = StorageService::photo_path(8, b"same", "png");
        assert_eq!(a, b);
        assert_ne!(a, other_user);
        assert!(a.starts_with("cards/7/"));
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn test_extension_from_mime() {
        assert_eq!(StorageService::extension_from_mime("image/png"), Some("png"));
        assert_eq!(StorageService::extension_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(StorageService::extension_from_mime("application/pdf"), None);
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.fs_root(), Some(DEFAULT_FS_ROOT));
        assert_eq!(config.public_base_url, DEFAULT_PUBLIC_BASE_URL);
        assert_eq!(config.backend_name(), "fs");
    }

    #[tokio::test]
    async fn test_upload_writes_under_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = fs_service(dir.path());

        let url = storage
            .upload_photo(3, b"\x89PNG fake", "image/png")
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/cards/3/"));

        let path = storage.path_from_url(&url).unwrap().to_string();
        assert!(storage.exists(&path).await.unwrap());
        assert!(dir.path().join(&path).is_file());

        let again = storage
            .upload_photo(3, b"\x89PNG fake", "image/png")
            .await
            .unwrap();
        assert_eq!(url, again);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let storage = fs_service(dir.path());

        let err = storage
            .upload_photo(1, b"%PDF", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_path_from_url_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = fs_service(dir.path());
        assert_eq!(storage.path_from_url("/uploads/../etc/passwd"), None);
        assert_eq!(storage.path_from_url("https://cdn.example/x.png"), None);
        assert_eq!(
            storage.path_from_url("/uploads/cards/1/a.png"),
            Some("cards/1/a.png")
        );
    }
}
