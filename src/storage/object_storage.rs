use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;

use super::error::StorageError;
use super::{ImageStorage, StorageKind, StoredObject};

pub const S3_MAX_WIDTH: u32 = 1000;

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_url: String,
}

/// S3-compatible object storage. Objects are uploaded world-readable and
/// addressed as `<public_url>/<key>`.
pub struct S3Storage {
    bucket: Box<Bucket>,
    public_url: String,
}

impl S3Storage {
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid S3 credentials: {}", e)))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)?.with_path_style();
        bucket.add_header("x-amz-acl", "public-read");

        tracing::info!(
            "S3 storage configured: bucket={}, endpoint={}",
            config.bucket,
            config.endpoint
        );

        Ok(Self {
            bucket,
            public_url: config.public_url.clone(),
        })
    }
}

fn check_status(operation: &str, path: &str, status: u16) -> Result<(), StorageError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(StorageError::Backend(format!(
            "{} {} returned HTTP {}",
            operation, path, status
        )))
    }
}

#[async_trait]
impl ImageStorage for S3Storage {
    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }

    fn max_width(&self) -> u32 {
        S3_MAX_WIDTH
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), path)
    }

    async fn put_object(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(path, data, content_type)
            .await?;
        check_status("PUT", path, response.status_code())
    }

    async fn delete_by_path(&self, path: &str) -> Result<(), StorageError> {
        let response = self.bucket.delete_object(path).await?;
        match response.status_code() {
            404 => {
                tracing::debug!("S3 object already absent: {}", path);
                Ok(())
            }
            status => check_status("DELETE", path, status),
        }
    }

    async fn list_objects(&self) -> Result<Vec<StoredObject>, StorageError> {
        let pages = self.bucket.list(String::new(), None).await?;

        let objects = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| StoredObject {
                modified_at: DateTime::parse_from_rfc3339(&object.last_modified)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                path: object.key,
            })
            .collect();

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config {
            bucket: "ads".to_string(),
            region: "ru-central1".to_string(),
            endpoint: "https://storage.example.net".to_string(),
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            public_url: "https://ads.storage.example.net/".to_string(),
        }
    }

    #[test]
    fn test_public_url_concatenation() {
        let storage = S3Storage::new(&config()).unwrap();
        assert_eq!(
            storage.public_url("abc.jpg"),
            "https://ads.storage.example.net/abc.jpg"
        );
        assert_eq!(storage.kind(), StorageKind::S3);
        assert_eq!(storage.max_width(), S3_MAX_WIDTH);
    }

    #[test]
    fn test_check_status() {
        assert!(check_status("PUT", "a.jpg", 200).is_ok());
        assert!(check_status("DELETE", "a.jpg", 204).is_ok());
        assert!(matches!(
            check_status("PUT", "a.jpg", 403),
            Err(StorageError::Backend(_))
        ));
    }
}
