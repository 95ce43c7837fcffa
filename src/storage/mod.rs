//! Object storage abstraction for generated QR images
//! Uses Apache Arrow object_store crate

mod connection_string;

pub use connection_string::{AzureConnectionString, ConnectionStringError};

use bytes::Bytes;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{
    Attribute, Attributes, ObjectStore, PutMode, PutOptions, PutPayload, path::Path as StoragePath,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{StorageConfig, StorageProvider};
use crate::secrets::StorageSecrets;

/// Key prefix for every uploaded QR image
pub const QR_PREFIX: &str = "qr_codes";

pub const PNG_CONTENT_TYPE: &str = "image/png";

const HEALTH_CHECK_KEY: &str = "qr_codes/.health-check";
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),

    #[error("Storage misconfigured: {0}")]
    Misconfigured(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Blob key for a generated QR image: `qr_codes/<uuid>.png`
pub fn qr_blob_path(id: &Uuid) -> String {
    format!("{QR_PREFIX}/{id}.png")
}

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Object read back from storage
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub container: String,
    /// Whether the backend keeps object attributes such as Content-Type
    supports_attributes: bool,
}

impl StorageClient {
    /// Create new storage client with any attribute-capable object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, container: String) -> Self {
        Self {
            store,
            container,
            supports_attributes: true,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "qrstash-local".to_string())
    }

    /// Filesystem storage rooted at `root/<container>`
    pub fn local(root: &Path, container: &str) -> Result<Self> {
        let dir = root.join(container);
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            store: Arc::new(LocalFileSystem::new_with_prefix(&dir)?),
            container: container.to_string(),
            supports_attributes: false,
        })
    }

    /// Azure Blob Storage container addressed by a connection string
    pub fn azure(connection: &AzureConnectionString, container: &str) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::new().with_container_name(container);

        if connection.use_development_storage {
            builder = builder.with_use_emulator(true);
        } else {
            builder = builder
                .with_account(connection.account_name.clone())
                .with_access_key(connection.account_key.clone());

            if let Some(endpoint) = connection.custom_blob_endpoint() {
                builder = builder
                    .with_allow_http(endpoint.starts_with("http://"))
                    .with_endpoint(endpoint);
            }
        }

        tracing::info!(
            account = %connection.account_name,
            container,
            emulator = connection.use_development_storage,
            "Using Azure Blob Storage"
        );

        Ok(Self::new(Arc::new(builder.build()?), container.to_string()))
    }

    /// Build the configured backend from startup secrets
    pub fn from_config(config: &StorageConfig, secrets: &StorageSecrets) -> Result<Self> {
        match config.provider {
            StorageProvider::Azure => {
                let connection = AzureConnectionString::parse(&secrets.connection_string)?;
                Self::azure(&connection, &secrets.container)
            }
            StorageProvider::Local => {
                let root = config.local_root.as_deref().ok_or_else(|| {
                    StorageError::Misconfigured("local provider requires local_root".to_string())
                })?;
                tracing::info!(root = %root.display(), container = %secrets.container, "Using local storage");
                Self::local(root, &secrets.container)
            }
            StorageProvider::Memory => {
                tracing::warn!("Using in-memory storage; uploads are lost on exit");
                Ok(Self::new(Arc::new(InMemory::new()), secrets.container.clone()))
            }
        }
    }

    /// Upload bytes to storage, replacing any existing object at `key`
    pub async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let mut attributes = Attributes::new();
        if self.supports_attributes {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }

        let options = PutOptions {
            mode: PutMode::Overwrite,
            attributes,
            ..Default::default()
        };

        let put_result = self
            .store
            .put_opts(&path, PutPayload::from(data), options)
            .await?;

        tracing::info!(key, size, container = %self.container, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<StoredObject> {
        let path = StoragePath::from(key);

        let result = self.store.get(&path).await?;
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| AsRef::<str>::as_ref(value).to_owned());
        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Downloaded from storage");

        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    /// Backend reachability, as seen by a metadata lookup of a sentinel key
    pub async fn health_check(&self) -> bool {
        self.check_reachable(HEALTH_CHECK_TIMEOUT).await
    }

    /// A missing sentinel key is healthy; any other error or a timeout is not
    pub async fn check_reachable(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.exists(HEALTH_CHECK_KEY)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::warn!(container = %self.container, error = %e, "Storage health check failed");
                false
            }
            Err(_) => {
                tracing::warn!(container = %self.container, "Storage health check timed out");
                false
            }
        }
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
