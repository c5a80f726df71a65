// Attachment uploads through object_store
//
// Blobs are written under `<prefix>/<id><extension>`. The returned location is the
// public origin joined with the object key.

use async_trait::async_trait;
use crashlane_core::{traits::AttachmentStore, Attachment, IngestError, Result};
use object_store::{path::Path, ObjectStore, PutPayload};
use std::sync::Arc;

/// Where attachment blobs are stored
#[derive(Debug, Clone)]
pub struct AttachmentStorageConfig {
    /// "memory", "local" or "s3"
    pub storage_type: String,
    /// Bucket name for s3, directory for local
    pub path: String,
    /// Key prefix inside the bucket
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Base used to build the location returned for each upload
    pub origin: Option<String>,
}

impl AttachmentStorageConfig {
    pub fn memory() -> Self {
        Self {
            storage_type: "memory".to_string(),
            path: String::new(),
            prefix: String::new(),
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            origin: None,
        }
    }

    /// Load from ATTACHMENTS_* environment variables.
    ///
    /// Returns `None` when ATTACHMENTS_STORAGE is not set.
    pub fn from_env() -> Option<Self> {
        let storage_type = std::env::var("ATTACHMENTS_STORAGE").ok()?;
        let path = match storage_type.as_str() {
            "local" => std::env::var("ATTACHMENTS_LOCAL_PATH").unwrap_or_default(),
            _ => std::env::var("ATTACHMENTS_S3_BUCKET").unwrap_or_default(),
        };
        Some(Self {
            storage_type,
            path,
            prefix: std::env::var("ATTACHMENTS_PREFIX").unwrap_or_default(),
            region: std::env::var("ATTACHMENTS_S3_REGION").ok(),
            endpoint: std::env::var("ATTACHMENTS_S3_ENDPOINT").ok(),
            access_key_id: std::env::var("ATTACHMENTS_ACCESS_KEY").ok(),
            secret_access_key: std::env::var("ATTACHMENTS_SECRET_ACCESS_KEY").ok(),
            origin: std::env::var("ATTACHMENTS_ORIGIN").ok(),
        })
    }

    fn default_origin(&self) -> String {
        match self.storage_type.as_str() {
            "s3" => match &self.endpoint {
                Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.path),
                None => format!("s3://{}", self.path),
            },
            "local" => format!("file://{}", self.path),
            _ => "memory://attachments".to_string(),
        }
    }
}

/// Create an object store from configuration
pub fn create_object_store(config: &AttachmentStorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.storage_type.as_str() {
        "local" => {
            std::fs::create_dir_all(&config.path)
                .map_err(|e| IngestError::config(format!("failed to create attachment directory: {e}")))?;
            let store = object_store::local::LocalFileSystem::new_with_prefix(&config.path)
                .map_err(|e| IngestError::config(format!("failed to create local store: {e}")))?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(object_store::memory::InMemory::new())),
        "s3" => {
            use object_store::aws::AmazonS3Builder;
            let mut builder = AmazonS3Builder::new().with_bucket_name(&config.path);

            if let Some(region) = &config.region {
                builder = builder.with_region(region);
            }
            if let Some(endpoint) = &config.endpoint {
                builder = builder.with_endpoint(endpoint).with_allow_http(true);
            }
            if let Some(key) = &config.access_key_id {
                builder = builder.with_access_key_id(key);
            }
            if let Some(secret) = &config.secret_access_key {
                builder = builder.with_secret_access_key(secret);
            }

            let store = builder
                .build()
                .map_err(|e| IngestError::config(format!("failed to create S3 store: {e}")))?;
            Ok(Arc::new(store))
        }
        other => Err(IngestError::config(format!(
            "unsupported attachment storage type: {}",
            other
        ))),
    }
}

// ============================================================================
// ObjectStoreAttachments
// ============================================================================

#[derive(Clone)]
pub struct ObjectStoreAttachments {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    origin: String,
}

impl ObjectStoreAttachments {
    pub fn new(store: Arc<dyn ObjectStore>, origin: impl Into<String>) -> Self {
        Self {
            store,
            prefix: String::new(),
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn from_config(config: &AttachmentStorageConfig) -> Result<Self> {
        let store = create_object_store(config)?;
        let origin = config.origin.clone().unwrap_or_else(|| config.default_origin());
        Ok(Self::new(store, origin).with_prefix(config.prefix.clone()))
    }

    fn object_path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }
}

#[async_trait]
impl AttachmentStore for ObjectStoreAttachments {
    async fn upload(&self, attachment: &Attachment) -> Result<String> {
        let key = if attachment.key.is_empty() {
            attachment.object_key()
        } else {
            attachment.key.clone()
        };
        let object_path = self.object_path(&key);

        self.store
            .put(&Path::from(object_path.as_str()), PutPayload::from(attachment.blob.clone()))
            .await
            .map_err(|e| IngestError::attachment(format!("failed to upload {}: {}", key, e)))?;

        tracing::debug!(attachment_id = %attachment.id, key = %object_path, "uploaded attachment");
        Ok(format!("{}/{}", self.origin, object_path))
    }
}
