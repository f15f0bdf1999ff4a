use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::database::timestamp;
use crate::models::user::User;
use crate::utils::error::AppResult;

pub async fn find_user<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(user)
}

pub async fn user_exists<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> AppResult<bool> {
    let exists: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = ?)")
        .bind(id)
        .fetch_one(executor)
        .await?;

    Ok(exists != 0)
}

pub async fn upsert_user_by_username<'e, E: SqliteExecutor<'e>>(
    executor: E,
    username: &str,
    now: DateTime<Utc>,
) -> AppResult<User> {
    let now = timestamp(now);

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, created_at, updated_at) VALUES (?, ?, ?)
         ON CONFLICT (username) DO UPDATE SET updated_at = excluded.updated_at
         RETURNING *",
    )
    .bind(username)
    .bind(&now)
    .bind(&now)
    .fetch_one(executor)
    .await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_pool;

    #[tokio::test]
    async fn test_upsert_keeps_identity() {
        let (pool, _dir) = test_pool().await;

        let first = upsert_user_by_username(pool.as_ref(), "alice", Utc::now()).await.unwrap();
        let again = upsert_user_by_username(pool.as_ref(), "alice", Utc::now()).await.unwrap();
        assert_eq!(first.id, again.id);

        assert!(user_exists(pool.as_ref(), first.id).await.unwrap());
        assert!(!user_exists(pool.as_ref(), first.id + 100).await.unwrap());
        assert_eq!(
            find_user(pool.as_ref(), first.id).await.unwrap().map(|u| u.username),
            Some("alice".to_string())
        );
    }
}
