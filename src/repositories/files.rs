use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::database::timestamp;
use crate::models::file::FileRecord;
use crate::storage::StoredImage;
use crate::utils::error::AppResult;

pub async fn insert_file<'e, E: SqliteExecutor<'e>>(
    executor: E,
    ad_uuid: &str,
    stored: &StoredImage,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    let result = sqlx::query(
        "INSERT INTO files (ad_uuid, path, preview_path, size, preview_size, mime, preview_mime, storage, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(ad_uuid)
    .bind(&stored.path)
    .bind(&stored.preview_path)
    .bind(stored.size)
    .bind(stored.preview_size)
    .bind(&stored.mime)
    .bind(&stored.preview_mime)
    .bind(stored.storage.as_str())
    .bind(timestamp(now))
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn delete_file<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM files WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Files of an ad in upload order; the first one is the listing thumbnail.
pub async fn find_files_by_ad<'e, E: SqliteExecutor<'e>>(
    executor: E,
    ad_uuid: &str,
) -> AppResult<Vec<FileRecord>> {
    let files = sqlx::query_as::<_, FileRecord>(
        "SELECT * FROM files WHERE ad_uuid = ? ORDER BY id ASC",
    )
    .bind(ad_uuid)
    .fetch_all(executor)
    .await?;

    Ok(files)
}

/// Every object path (full and preview) referenced by rows of one backend.
pub async fn list_paths_for_storage<'e, E: SqliteExecutor<'e>>(
    executor: E,
    storage: &str,
) -> AppResult<HashSet<String>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT path, preview_path FROM files WHERE storage = ?",
    )
    .bind(storage)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .flat_map(|(path, preview_path)| [path, preview_path])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ad::AdFields;
    use crate::repositories::{ads, test_pool, users};
    use crate::storage::StorageKind;

    fn stored(name: &str) -> StoredImage {
        StoredImage {
            path: format!("{}.jpg", name),
            preview_path: format!("{}_preview.jpg", name),
            size: 1000,
            preview_size: 100,
            mime: "image/jpeg".to_string(),
            preview_mime: "image/jpeg".to_string(),
            storage: StorageKind::Local,
        }
    }

    #[tokio::test]
    async fn test_file_rows_lifecycle() {
        let (pool, _dir) = test_pool().await;
        let user = users::upsert_user_by_username(pool.as_ref(), "seller", Utc::now())
            .await
            .unwrap();
        let ad = ads::insert_ad(
            pool.as_ref(),
            user.id,
            &AdFields {
                title: "Desk".to_string(),
                description: "Oak".to_string(),
                price: 5,
                category_id: 1,
            },
            Utc::now(),
        )
        .await
        .unwrap();

        let first = insert_file(pool.as_ref(), &ad, &stored("a"), Utc::now()).await.unwrap();
        insert_file(pool.as_ref(), &ad, &stored("b"), Utc::now()).await.unwrap();

        let files = find_files_by_ad(pool.as_ref(), &ad).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "a.jpg");
        assert_eq!(files[0].storage, "local");

        let paths = list_paths_for_storage(pool.as_ref(), "local").await.unwrap();
        assert!(paths.contains("a_preview.jpg"));
        assert!(paths.contains("b.jpg"));
        assert!(list_paths_for_storage(pool.as_ref(), "s3").await.unwrap().is_empty());

        delete_file(pool.as_ref(), first).await.unwrap();
        let files = find_files_by_ad(pool.as_ref(), &ad).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "b.jpg");
    }
}
