use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata for one stored full/preview pair bound to an ad.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub ad_uuid: String,
    pub path: String,
    pub preview_path: String,
    pub size: i64,
    pub preview_size: i64,
    pub mime: String,
    pub preview_mime: String,
    pub storage: String,
    pub created_at: String,
}
