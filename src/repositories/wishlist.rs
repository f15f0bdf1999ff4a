use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::database::timestamp;
use crate::utils::error::AppResult;

/// Returns false when the entry already existed.
pub async fn add<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: i64,
    ad_uuid: &str,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let result = sqlx::query(
        "INSERT INTO wishlist (user_id, ad_uuid, created_at) VALUES (?, ?, ?)
         ON CONFLICT (user_id, ad_uuid) DO NOTHING",
    )
    .bind(user_id)
    .bind(ad_uuid)
    .bind(timestamp(now))
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn remove<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: i64,
    ad_uuid: &str,
) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM wishlist WHERE user_id = ? AND ad_uuid = ?")
        .bind(user_id)
        .bind(ad_uuid)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn has<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: i64,
    ad_uuid: &str,
) -> AppResult<bool> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM wishlist WHERE user_id = ? AND ad_uuid = ?)",
    )
    .bind(user_id)
    .bind(ad_uuid)
    .fetch_one(executor)
    .await?;

    Ok(exists != 0)
}
