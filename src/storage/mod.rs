mod error;

pub mod local;
pub mod object_storage;

pub use error::StorageError;
pub use local::LocalStorage;
pub use object_storage::{S3Config, S3Storage};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{ProcessedImage, UploadedImage, process_image};
use crate::utils::error::AppResult;

/// Which backend wrote a file row. Persisted so assets can be resolved and
/// deleted after the active backend changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Local,
    S3,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::S3 => "s3",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(StorageKind::Local),
            "s3" => Some(StorageKind::S3),
            _ => None,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths and metadata of a durably written full/preview pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: String,
    pub preview_path: String,
    pub size: i64,
    pub preview_size: i64,
    pub mime: String,
    pub preview_mime: String,
    pub storage: StorageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub modified_at: DateTime<Utc>,
}

pub fn generate_object_names() -> (String, String) {
    let id = uuid::Uuid::new_v4();
    (format!("{}.jpg", id), format!("{}_preview.jpg", id))
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Width cap for the full-size variant written to this backend.
    fn max_width(&self) -> u32;

    fn public_url(&self, path: &str) -> String;

    async fn put_object(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Deleting a path that does not exist succeeds.
    async fn delete_by_path(&self, path: &str) -> Result<(), StorageError>;

    async fn list_objects(&self) -> Result<Vec<StoredObject>, StorageError>;

    async fn store_processed(
        &self,
        processed: &ProcessedImage,
    ) -> Result<StoredImage, StorageError> {
        let (path, preview_path) = generate_object_names();

        self.put_object(&path, &processed.full.bytes, &processed.full.mime)
            .await?;

        if let Err(e) = self
            .put_object(&preview_path, &processed.preview.bytes, &processed.preview.mime)
            .await
        {
            if let Err(cleanup) = self.delete_by_path(&path).await {
                tracing::warn!(
                    "Failed to remove full image {} after preview write failed: {}",
                    path,
                    cleanup
                );
            }
            return Err(e);
        }

        Ok(StoredImage {
            path,
            preview_path,
            size: processed.full.bytes.len() as i64,
            preview_size: processed.preview.bytes.len() as i64,
            mime: processed.full.mime.clone(),
            preview_mime: processed.preview.mime.clone(),
            storage: self.kind(),
        })
    }
}

/// Decodes and normalizes an upload off the async runtime, then writes the
/// derived pair to `storage`.
pub async fn save_upload(
    storage: &Arc<dyn ImageStorage>,
    upload: UploadedImage,
) -> AppResult<StoredImage> {
    let max_width = storage.max_width();
    let file_name = upload.file_name.clone();

    let processed = tokio::task::spawn_blocking(move || process_image(&upload, max_width))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
        .inspect_err(|e| tracing::warn!("Rejected upload {}: {}", file_name, e))?;

    let stored = storage.store_processed(&processed).await?;

    tracing::debug!(
        "Stored image pair: file={}, source={}, backend={}, path={}, size={}, preview_size={}",
        file_name,
        processed.source_format,
        stored.storage,
        stored.path,
        stored.size,
        stored.preview_size
    );

    Ok(stored)
}

/// The backend new uploads go to, plus every backend that may still hold
/// assets referenced by existing rows.
#[derive(Clone)]
pub struct StorageSet {
    active: Arc<dyn ImageStorage>,
    backends: HashMap<StorageKind, Arc<dyn ImageStorage>>,
}

impl StorageSet {
    pub fn new(active: Arc<dyn ImageStorage>) -> Self {
        let mut backends = HashMap::new();
        backends.insert(active.kind(), active.clone());
        Self { active, backends }
    }

    /// Registers an additional backend. The active backend is never replaced.
    pub fn with_backend(mut self, backend: Arc<dyn ImageStorage>) -> Self {
        self.backends.entry(backend.kind()).or_insert(backend);
        self
    }

    pub fn active(&self) -> &Arc<dyn ImageStorage> {
        &self.active
    }

    pub fn get(&self, kind: StorageKind) -> Result<&Arc<dyn ImageStorage>, StorageError> {
        self.backends
            .get(&kind)
            .ok_or_else(|| StorageError::NotConfigured(kind.to_string()))
    }

    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn ImageStorage>> {
        self.backends.values()
    }

    /// Public URL for a stored path, or `None` when there is nothing to show.
    pub fn public_url(&self, storage: &str, path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }

        let kind = StorageKind::parse(storage)?;
        match self.backends.get(&kind) {
            Some(backend) => Some(backend.public_url(path)),
            None => {
                tracing::warn!("No backend registered for stored file {} ({})", path, storage);
                None
            }
        }
    }

    pub async fn delete_pair(
        &self,
        storage: &str,
        path: &str,
        preview_path: &str,
    ) -> Result<(), StorageError> {
        let kind =
            StorageKind::parse(storage).ok_or_else(|| StorageError::NotConfigured(storage.into()))?;
        let backend = self.get(kind)?;

        backend.delete_by_path(path).await?;
        backend.delete_by_path(preview_path).await?;
        Ok(())
    }
}
