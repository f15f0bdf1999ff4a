use chrono::{DateTime, Months, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::database::timestamp;
use crate::models::ad::{AD_LIFETIME_MONTHS, Ad, AdFields, AdFilter, AdListPage, AdListRow, AdStatus};
use crate::utils::error::{AppError, AppResult};

const LIST_COLUMNS: &str = "SELECT ads.uuid, ads.title, ads.category_id, ads.price, ads.status, ads.created_at, \
     COALESCE(f.preview_path, '') AS image, COALESCE(f.storage, '') AS image_storage, \
     COUNT(*) OVER() AS total \
     FROM ads \
     LEFT JOIN files f ON f.id = (SELECT MIN(id) FROM files WHERE files.ad_uuid = ads.uuid)";

pub async fn insert_ad<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: i64,
    fields: &AdFields,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let uuid = Uuid::new_v4().to_string();
    let expires_at = now
        .checked_add_months(Months::new(AD_LIFETIME_MONTHS))
        .ok_or_else(|| AppError::Internal("Ad expiry out of range".to_string()))?;

    sqlx::query(
        "INSERT INTO ads (uuid, user_id, category_id, title, description, price, status, expires_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&uuid)
    .bind(user_id)
    .bind(fields.category_id)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.price)
    .bind(AdStatus::Active.code())
    .bind(timestamp(expires_at))
    .bind(timestamp(now))
    .bind(timestamp(now))
    .execute(executor)
    .await?;

    Ok(uuid)
}

/// Only active ads are editable; returns false when nothing was updated.
pub async fn update_ad_fields<'e, E: SqliteExecutor<'e>>(
    executor: E,
    uuid: &str,
    fields: &AdFields,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE ads SET title = ?, description = ?, price = ?, category_id = ?, updated_at = ?
         WHERE uuid = ? AND status = ?",
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.price)
    .bind(fields.category_id)
    .bind(timestamp(now))
    .bind(uuid)
    .bind(AdStatus::Active.code())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn find_ad<'e, E: SqliteExecutor<'e>>(executor: E, uuid: &str) -> AppResult<Option<Ad>> {
    let ad = sqlx::query_as::<_, Ad>("SELECT * FROM ads WHERE uuid = ?")
        .bind(uuid)
        .fetch_optional(executor)
        .await?;

    Ok(ad)
}

pub async fn ad_exists<'e, E: SqliteExecutor<'e>>(executor: E, uuid: &str) -> AppResult<bool> {
    let exists: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM ads WHERE uuid = ?)")
        .bind(uuid)
        .fetch_one(executor)
        .await?;

    Ok(exists != 0)
}

/// Moves an active ad to `status`. Returns false when the ad was no longer
/// active, so a terminal status is never overwritten.
pub async fn transition_status<'e, E: SqliteExecutor<'e>>(
    executor: E,
    uuid: &str,
    status: AdStatus,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE ads SET status = ?, updated_at = ? WHERE uuid = ? AND status = ?",
    )
    .bind(status.code())
    .bind(timestamp(now))
    .bind(uuid)
    .bind(AdStatus::Active.code())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &AdFilter) {
    let status = filter.status.unwrap_or(AdStatus::Active);
    builder.push(" WHERE ads.status = ").push_bind(status.code());

    if let Some(category_id) = filter.category_id {
        builder.push(" AND ads.category_id = ").push_bind(category_id);
    }

    if let Some(user_id) = filter.user_id {
        builder.push(" AND ads.user_id = ").push_bind(user_id);
    }
}

/// One page of ads matching `filter`, with the full match count.
pub async fn find_ads(pool: &SqlitePool, filter: &AdFilter) -> AppResult<AdListPage> {
    let page = filter.page.max(1);

    // A page that far out is past any real data.
    let Some(offset) = (page - 1).checked_mul(filter.limit) else {
        return Ok(AdListPage {
            items: Vec::new(),
            total: count_ads(pool, filter).await?,
        });
    };

    let mut builder = QueryBuilder::<Sqlite>::new(LIST_COLUMNS);
    push_filters(&mut builder, filter);
    builder.push(format!(
        " ORDER BY ads.{} {}, ads.rowid {}",
        filter.sort.column,
        filter.sort.order.as_sql(),
        filter.sort.order.as_sql()
    ));
    builder
        .push(" LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let items = builder
        .build_query_as::<AdListRow>()
        .fetch_all(pool)
        .await?;

    // The window count only exists on returned rows; past the last page
    // the total still has to be reported.
    let total = match items.first() {
        Some(row) => row.total,
        None if page > 1 => count_ads(pool, filter).await?,
        None => 0,
    };

    Ok(AdListPage { items, total })
}

pub async fn count_ads(pool: &SqlitePool, filter: &AdFilter) -> AppResult<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ads");
    push_filters(&mut builder, filter);

    let total = builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// Favorited ads in any status, most recently favorited first.
pub async fn find_favorite_ads<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: i64,
) -> AppResult<Vec<AdListRow>> {
    let query = format!(
        "{} INNER JOIN wishlist w ON w.ad_uuid = ads.uuid
         WHERE w.user_id = ?
         ORDER BY w.created_at DESC, w.rowid DESC",
        LIST_COLUMNS
    );

    let rows = sqlx::query_as::<_, AdListRow>(&query)
        .bind(user_id)
        .fetch_all(executor)
        .await?;

    Ok(rows)
}

pub async fn find_expired_ad_ids<'e, E: SqliteExecutor<'e>>(
    executor: E,
    now: DateTime<Utc>,
) -> AppResult<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT uuid FROM ads WHERE status = ? AND expires_at < ? ORDER BY expires_at ASC",
    )
    .bind(AdStatus::Active.code())
    .bind(timestamp(now))
    .fetch_all(executor)
    .await?;

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ad::{SortOrder, SortSpec};
    use crate::repositories::{test_pool, users};
    use chrono::Duration;

    fn fields(title: &str, price: i64, category_id: i64) -> AdFields {
        AdFields {
            title: title.to_string(),
            description: "description".to_string(),
            price,
            category_id,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (pool, _dir) = test_pool().await;
        let user = users::upsert_user_by_username(pool.as_ref(), "seller", Utc::now())
            .await
            .unwrap();

        let now = Utc::now();
        let uuid = insert_ad(pool.as_ref(), user.id, &fields("Honda Wave", 150000, 2), now)
            .await
            .unwrap();

        let ad = find_ad(pool.as_ref(), &uuid).await.unwrap().unwrap();
        assert_eq!(ad.title, "Honda Wave");
        assert_eq!(ad.price, 150000);
        assert!(ad.is_active());
        assert!(ad.expires_at > ad.created_at);
        assert!(ad_exists(pool.as_ref(), &uuid).await.unwrap());
        assert!(!ad_exists(pool.as_ref(), "missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_transition_only_from_active() {
        let (pool, _dir) = test_pool().await;
        let user = users::upsert_user_by_username(pool.as_ref(), "seller", Utc::now())
            .await
            .unwrap();
        let uuid = insert_ad(pool.as_ref(), user.id, &fields("Lamp", 10, 1), Utc::now())
            .await
            .unwrap();

        assert!(transition_status(pool.as_ref(), &uuid, AdStatus::Sold, Utc::now()).await.unwrap());
        assert!(!transition_status(pool.as_ref(), &uuid, AdStatus::UserDeleted, Utc::now())
            .await
            .unwrap());

        let ad = find_ad(pool.as_ref(), &uuid).await.unwrap().unwrap();
        assert_eq!(ad.status(), Some(AdStatus::Sold));
    }

    #[tokio::test]
    async fn test_find_ads_total_independent_of_page() {
        let (pool, _dir) = test_pool().await;
        let user = users::upsert_user_by_username(pool.as_ref(), "seller", Utc::now())
            .await
            .unwrap();
        for i in 0..5 {
            insert_ad(pool.as_ref(), user.id, &fields(&format!("ad {}", i), i * 100, 1), Utc::now())
                .await
                .unwrap();
        }
        insert_ad(pool.as_ref(), user.id, &fields("other", 1, 2), Utc::now())
            .await
            .unwrap();

        let mut filter = AdFilter {
            limit: 2,
            category_id: Some(1),
            sort: SortSpec {
                column: "price",
                order: SortOrder::Asc,
            },
            ..AdFilter::default()
        };

        for page in 1..=4 {
            filter.page = page;
            let result = find_ads(pool.as_ref(), &filter).await.unwrap();
            assert_eq!(result.total, 5, "page {}", page);
            assert!(result.items.len() <= 2);
        }

        filter.page = 1;
        let first = find_ads(pool.as_ref(), &filter).await.unwrap();
        assert_eq!(first.items[0].price, 0);
        assert_eq!(first.items[1].price, 100);
        assert_eq!(first.items[0].image, "");
    }

    #[tokio::test]
    async fn test_find_ads_far_page_is_empty() {
        let (pool, _dir) = test_pool().await;
        let user = users::upsert_user_by_username(pool.as_ref(), "seller", Utc::now())
            .await
            .unwrap();
        insert_ad(pool.as_ref(), user.id, &fields("Lamp", 10, 1), Utc::now())
            .await
            .unwrap();

        let filter = AdFilter {
            page: i64::MAX,
            ..AdFilter::default()
        };
        let result = find_ads(pool.as_ref(), &filter).await.unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_find_expired_ad_ids() {
        let (pool, _dir) = test_pool().await;
        let user = users::upsert_user_by_username(pool.as_ref(), "seller", Utc::now())
            .await
            .unwrap();

        let old = Utc::now() - Duration::days(62);
        let expired = insert_ad(pool.as_ref(), user.id, &fields("old", 1, 1), old)
            .await
            .unwrap();
        insert_ad(pool.as_ref(), user.id, &fields("fresh", 1, 1), Utc::now())
            .await
            .unwrap();

        let ids = find_expired_ad_ids(pool.as_ref(), Utc::now()).await.unwrap();
        assert_eq!(ids, vec![expired.clone()]);

        transition_status(pool.as_ref(), &expired, AdStatus::Expired, Utc::now())
            .await
            .unwrap();
        assert!(find_expired_ad_ids(pool.as_ref(), Utc::now()).await.unwrap().is_empty());
    }
}
