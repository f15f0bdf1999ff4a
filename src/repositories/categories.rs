use sqlx::SqliteExecutor;

use crate::utils::error::AppResult;

pub async fn exists<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> AppResult<bool> {
    let exists: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = ?)")
        .bind(id)
        .fetch_one(executor)
        .await?;

    Ok(exists != 0)
}
