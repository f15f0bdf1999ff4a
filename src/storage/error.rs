use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage backend '{0}' is not configured")]
    NotConfigured(String),

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("image processing task failed: {0}")]
    Task(String),
}

impl From<s3::error::S3Error> for StorageError {
    fn from(err: s3::error::S3Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
