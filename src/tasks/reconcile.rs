use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::repositories::files;
use crate::services::AdService;
use crate::storage::StorageSet;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Deletes backend objects that no file row references and that are older
/// than `grace`. Younger objects may belong to a transaction that has not
/// committed yet.
pub async fn sweep_orphans(
    db: &SqlitePool,
    storages: &StorageSet,
    grace: Duration,
) -> AppResult<SweepReport> {
    let grace = chrono::Duration::from_std(grace)
        .map_err(|e| AppError::Internal(format!("Invalid orphan grace period: {}", e)))?;
    let cutoff = Utc::now() - grace;

    let mut report = SweepReport::default();

    for backend in storages.backends() {
        let kind = backend.kind();
        let referenced = files::list_paths_for_storage(db, kind.as_str()).await?;
        let objects = backend.list_objects().await?;

        for object in objects {
            report.scanned += 1;

            if referenced.contains(&object.path) || object.modified_at > cutoff {
                continue;
            }

            match backend.delete_by_path(&object.path).await {
                Ok(()) => {
                    tracing::info!("Removed orphaned object {} from {}", object.path, kind);
                    report.removed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to remove orphaned object {} from {}: {}",
                        object.path,
                        kind,
                        e
                    );
                    report.failed += 1;
                }
            }
        }
    }

    tracing::info!(
        "Reconciliation sweep: scanned={}, removed={}, failed={}",
        report.scanned,
        report.removed,
        report.failed
    );

    Ok(report)
}

pub fn start_reconcile_task(service: AdService, every: Duration, grace: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(e) = sweep_orphans(service.db(), service.storages(), grace).await {
                tracing::error!("Reconciliation task failed: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ad::AdFields;
    use crate::repositories::{ads, test_pool, users};
    use crate::storage::{ImageStorage, LocalStorage, StorageKind, StoredImage};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_removes_only_unreferenced() {
        let (pool, dir) = test_pool().await;
        let local: Arc<dyn ImageStorage> = Arc::new(
            LocalStorage::new(dir.path().join("uploads"), "/uploads")
                .await
                .unwrap(),
        );
        let storages = StorageSet::new(local.clone());

        let user = users::upsert_user_by_username(pool.as_ref(), "seller", Utc::now())
            .await
            .unwrap();
        let ad = ads::insert_ad(
            pool.as_ref(),
            user.id,
            &AdFields {
                title: "Chair".to_string(),
                description: "Wooden".to_string(),
                price: 1,
                category_id: 1,
            },
            Utc::now(),
        )
        .await
        .unwrap();

        for name in ["kept.jpg", "kept_preview.jpg", "orphan.jpg"] {
            local.put_object(name, b"x", "image/jpeg").await.unwrap();
        }
        files::insert_file(
            pool.as_ref(),
            &ad,
            &StoredImage {
                path: "kept.jpg".to_string(),
                preview_path: "kept_preview.jpg".to_string(),
                size: 1,
                preview_size: 1,
                mime: "image/jpeg".to_string(),
                preview_mime: "image/jpeg".to_string(),
                storage: StorageKind::Local,
            },
            Utc::now(),
        )
        .await
        .unwrap();

        // Fresh objects are inside the grace period.
        let report = sweep_orphans(pool.as_ref(), &storages, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(report.removed, 0);

        let report = sweep_orphans(pool.as_ref(), &storages, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.removed, 1);

        let uploads = dir.path().join("uploads");
        assert!(!uploads.join("orphan.jpg").exists());
        assert!(uploads.join("kept.jpg").exists());
        assert!(uploads.join("kept_preview.jpg").exists());
    }
}
