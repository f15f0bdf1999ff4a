use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::StorageError;
use super::{ImageStorage, StorageKind, StoredObject};

pub const LOCAL_MAX_WIDTH: u32 = 1200;

const TMP_DIR: &str = ".tmp";

/// Filesystem-backed image storage. Objects live flat under `base_dir` and
/// are served statically from `public_base_url`.
pub struct LocalStorage {
    base_dir: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub async fn new(
        base_dir: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;
        fs::create_dir_all(base_dir.join(TMP_DIR)).await?;

        Ok(Self {
            base_dir,
            public_base_url: public_base_url.into(),
        })
    }

    fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        if path.is_empty()
            || path.starts_with('.')
            || path.contains('/')
            || path.contains('\\')
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(self.base_dir.join(path))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_dir
            .join(TMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ImageStorage for LocalStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    fn max_width(&self) -> u32 {
        LOCAL_MAX_WIDTH
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }

    async fn put_object(
        &self,
        path: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let target = self.object_path(path)?;
        let temp_path = self.temp_path();

        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &target).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete_by_path(&self, path: &str) -> Result<(), StorageError> {
        let target = self.object_path(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Local object already absent: {}", path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(&self) -> Result<Vec<StoredObject>, StorageError> {
        let mut objects = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let modified_at: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            objects.push(StoredObject {
                path: name,
                modified_at,
            });
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (LocalStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path().join("uploads"), "/uploads/")
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_and_delete() {
        let (store, dir) = temp_store().await;
        store.put_object("a.jpg", b"jpeg", "image/jpeg").await.unwrap();

        let on_disk = dir.path().join("uploads").join("a.jpg");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"jpeg");

        store.delete_by_path("a.jpg").await.unwrap();
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let (store, _dir) = temp_store().await;
        assert!(store.delete_by_path("never-written.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (store, _dir) = temp_store().await;
        for bad in ["../etc/passwd", "nested/a.jpg", ".tmp", ""] {
            assert!(matches!(
                store.put_object(bad, b"x", "image/jpeg").await,
                Err(StorageError::InvalidPath(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_list_skips_temp_dir() {
        let (store, _dir) = temp_store().await;
        store.put_object("a.jpg", b"1", "image/jpeg").await.unwrap();
        store.put_object("a_preview.jpg", b"2", "image/jpeg").await.unwrap();

        let mut paths: Vec<_> = store
            .list_objects()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.path)
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["a.jpg", "a_preview.jpg"]);
    }

    #[test]
    fn test_public_url_trims_slash() {
        let store = LocalStorage {
            base_dir: PathBuf::from("/tmp/x"),
            public_base_url: "https://example.com/uploads/".to_string(),
        };
        assert_eq!(store.public_url("a.jpg"), "https://example.com/uploads/a.jpg");
    }
}
