use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use sqlx::SqliteConnection;

use crate::database::DbPool;
use crate::media::UploadedImage;
use crate::models::ad::{
    Ad, AdFields, AdFilter, AdListItem, AdListQuery, AdListResponse, AdListRow, AdResponse, AdStatus,
    AdForm, CreateAdResponse, OWN_LIST_LIMIT, OwnAdsResponse, PAGE_SIZE, SortOrder, SortSpec,
};
use crate::models::file::FileRecord;
use crate::repositories::{ads, files, users, wishlist};
use crate::services::validation;
use crate::storage::{StorageSet, StoredImage, save_upload};
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::parse_int_or;

/// User-facing sort keys and the columns they may select.
static SORT_COLUMNS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("date", "created_at"), ("price", "price")]));

/// Parses `<key>_<asc|desc>`. Anything else sorts newest first.
pub fn parse_sort(raw: Option<&str>) -> SortSpec {
    let Some((key, direction)) = raw.and_then(|s| s.split_once('_')) else {
        return SortSpec::default();
    };

    let Some(&column) = SORT_COLUMNS.get(key) else {
        return SortSpec::default();
    };

    let order = match direction {
        "asc" => SortOrder::Asc,
        "desc" => SortOrder::Desc,
        _ => return SortSpec::default(),
    };

    SortSpec { column, order }
}

/// Comparable name for a keep-list entry: the last path segment of a
/// public URL, or the bare name itself.
pub fn keep_key(entry: &str) -> Option<String> {
    let without_suffix = entry.split(['?', '#']).next().unwrap_or_default();

    let name = without_suffix.rsplit('/').next().unwrap_or_default().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveReport {
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn log_failure(operation: &str, ad_uuid: Option<&str>, user_id: Option<i64>, err: &AppError) {
    let ad = ad_uuid.unwrap_or("-");
    let user = user_id.map_or_else(|| "-".to_string(), |id| id.to_string());

    if err.is_internal() {
        tracing::error!(
            "{} failed: ad={}, user={}, error={}",
            operation,
            ad,
            user,
            err
        );
    } else {
        tracing::debug!(
            "{} rejected: ad={}, user={}, reason={}",
            operation,
            ad,
            user,
            err
        );
    }
}

/// Ad use cases: validation, the ad and file tables, and the image
/// backends, kept consistent per operation by one database transaction.
#[derive(Clone)]
pub struct AdService {
    db: DbPool,
    storages: StorageSet,
}

impl AdService {
    pub fn new(db: DbPool, storages: StorageSet) -> Self {
        Self { db, storages }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn storages(&self) -> &StorageSet {
        &self.storages
    }

    fn list_item(&self, row: AdListRow, with_image: bool) -> AdListItem {
        let image = if with_image {
            self.storages.public_url(&row.image_storage, &row.image)
        } else {
            None
        };
        AdListItem::from_row(row, image)
    }

    pub async fn list_ads(&self, query: &AdListQuery) -> AppResult<AdListResponse> {
        let page = parse_int_or(query.page.as_deref(), 1).max(1);
        let category_id = Some(parse_int_or(query.category_id.as_deref(), 0)).filter(|id| *id > 0);

        let filter = AdFilter {
            page,
            limit: PAGE_SIZE,
            category_id,
            sort: parse_sort(query.sort.as_deref()),
            ..AdFilter::default()
        };

        let result = ads::find_ads(&self.db, &filter)
            .await
            .inspect_err(|e| log_failure("list_ads", None, None, e))?;

        Ok(AdListResponse {
            items: result
                .items
                .into_iter()
                .map(|row| self.list_item(row, true))
                .collect(),
            total: result.total,
            limit: filter.limit,
            page: filter.page,
        })
    }

    async fn own_ads(
        &self,
        operation: &str,
        user_id: i64,
        status: AdStatus,
    ) -> AppResult<OwnAdsResponse> {
        let filter = AdFilter {
            limit: OWN_LIST_LIMIT,
            user_id: Some(user_id),
            status: Some(status),
            ..AdFilter::default()
        };

        let result = ads::find_ads(&self.db, &filter)
            .await
            .inspect_err(|e| log_failure(operation, None, Some(user_id), e))?;

        let items: Vec<AdListItem> = result
            .items
            .into_iter()
            .map(|row| self.list_item(row, true))
            .collect();

        Ok(OwnAdsResponse {
            total: items.len() as i64,
            items,
        })
    }

    pub async fn my_ads(&self, user_id: i64) -> AppResult<OwnAdsResponse> {
        self.own_ads("my_ads", user_id, AdStatus::Active).await
    }

    pub async fn my_sold_ads(&self, user_id: i64) -> AppResult<OwnAdsResponse> {
        self.own_ads("my_sold_ads", user_id, AdStatus::Sold).await
    }

    /// Favorites in any status. Only active ads get a thumbnail since the
    /// files of terminal ads are gone.
    pub async fn my_favorite_ads(&self, user_id: i64) -> AppResult<OwnAdsResponse> {
        let rows = ads::find_favorite_ads(self.db.as_ref(), user_id)
            .await
            .inspect_err(|e| log_failure("my_favorite_ads", None, Some(user_id), e))?;

        let items: Vec<AdListItem> = rows
            .into_iter()
            .map(|row| {
                let active = row.status == AdStatus::Active.code();
                self.list_item(row, active)
            })
            .collect();

        Ok(OwnAdsResponse {
            total: items.len() as i64,
            items,
        })
    }

    pub async fn get_ad(&self, user_id: i64, uuid: &str) -> AppResult<AdResponse> {
        self.load_ad_detail(user_id, uuid)
            .await
            .inspect_err(|e| log_failure("get_ad", Some(uuid), Some(user_id), e))
    }

    async fn load_ad_detail(&self, user_id: i64, uuid: &str) -> AppResult<AdResponse> {
        let db = self.db.as_ref();

        let ad = ads::find_ad(db, uuid)
            .await?
            .ok_or_else(|| AppError::NotFound("Ad not found".to_string()))?;

        if !ad.is_active() {
            return Err(AppError::AdNotActive);
        }

        let ad_files = files::find_files_by_ad(db, uuid).await?;

        let owner = users::find_user(db, ad.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ad owner not found".to_string()))?;

        let is_favorite = wishlist::has(db, user_id, uuid).await?;

        let images = ad_files
            .iter()
            .filter_map(|f| self.storages.public_url(&f.storage, &f.path))
            .collect();

        Ok(AdResponse {
            status: AdStatus::Active.as_str().to_string(),
            is_owner: ad.user_id == user_id,
            is_favorite,
            owner_username: owner.username,
            images,
            uuid: ad.uuid,
            title: ad.title,
            description: ad.description,
            category_id: ad.category_id,
            price: ad.price,
            created_at: ad.created_at,
            expires_at: ad.expires_at,
        })
    }

    pub async fn create_ad(&self, user_id: i64, form: AdForm) -> AppResult<CreateAdResponse> {
        let AdForm {
            fields,
            images,
            errors,
            ..
        } = form;

        validation::validate_create(&self.db, &fields, images.len(), errors)
            .await
            .inspect_err(|e| log_failure("create_ad", None, Some(user_id), e))?;

        let mut written = Vec::new();
        match self.create_in_tx(user_id, &fields, images, &mut written).await {
            Ok(uuid) => {
                tracing::info!(
                    "Ad created: ad={}, user={}, images={}",
                    uuid,
                    user_id,
                    written.len()
                );
                Ok(CreateAdResponse { uuid })
            }
            Err(e) => {
                log_failure("create_ad", None, Some(user_id), &e);
                self.discard_written(written).await;
                Err(e)
            }
        }
    }

    async fn create_in_tx(
        &self,
        user_id: i64,
        fields: &AdFields,
        images: Vec<UploadedImage>,
        written: &mut Vec<StoredImage>,
    ) -> AppResult<String> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let uuid = ads::insert_ad(&mut *tx, user_id, fields, now).await?;
        self.store_images(&mut tx, &uuid, images, now, written)
            .await?;

        tx.commit().await?;
        Ok(uuid)
    }

    /// Runs each upload through the media pipeline into the active backend
    /// and records a file row for it. Objects that reached the backend are
    /// pushed to `written` even if a later step fails.
    async fn store_images(
        &self,
        conn: &mut SqliteConnection,
        ad_uuid: &str,
        images: Vec<UploadedImage>,
        now: DateTime<Utc>,
        written: &mut Vec<StoredImage>,
    ) -> AppResult<()> {
        let storage = self.storages.active();

        for upload in images {
            let stored = save_upload(storage, upload).await?;
            written.push(stored.clone());
            files::insert_file(&mut *conn, ad_uuid, &stored, now).await?;
        }

        Ok(())
    }

    /// Best-effort removal of objects written by a mutation that did not
    /// commit. Leftovers are picked up by the reconciliation sweep.
    async fn discard_written(&self, written: Vec<StoredImage>) {
        for stored in written {
            let result = self
                .storages
                .delete_pair(stored.storage.as_str(), &stored.path, &stored.preview_path)
                .await;

            if let Err(e) = result {
                tracing::warn!(
                    "Failed to remove uncommitted image {} from {}: {}",
                    stored.path,
                    stored.storage,
                    e
                );
            }
        }
    }

    /// Removes the backend objects of file rows that are already committed
    /// as deleted. Failures leave orphans for the reconciliation sweep.
    async fn purge_objects(&self, removed: &[FileRecord]) {
        for file in removed {
            let result = self
                .storages
                .delete_pair(&file.storage, &file.path, &file.preview_path)
                .await;

            if let Err(e) = result {
                tracing::warn!(
                    "Failed to remove objects of deleted file {} from {}: {}",
                    file.path,
                    file.storage,
                    e
                );
            }
        }
    }

    /// Owner check, then visibility, then field validation. A caller that
    /// does not own the ad is refused before anything else is looked at.
    pub async fn update_ad(&self, user_id: i64, uuid: &str, form: AdForm) -> AppResult<()> {
        let log = |e: &AppError| log_failure("update_ad", Some(uuid), Some(user_id), e);

        let AdForm {
            fields,
            old_images,
            images,
            errors,
        } = form;

        let existing = ads::find_ad(self.db.as_ref(), uuid)
            .await
            .inspect_err(log)?;

        if let Some(ad) = existing {
            Self::check_mutable(&ad, Some(user_id)).inspect_err(log)?;
        }

        validation::validate_update(
            &self.db,
            uuid,
            &fields,
            old_images.len() + images.len(),
            errors,
        )
        .await
        .inspect_err(log)?;

        let keep: HashSet<String> = old_images
            .iter()
            .filter_map(|entry| keep_key(entry))
            .collect();

        let mut written = Vec::new();
        match self
            .update_in_tx(uuid, &fields, &keep, images, &mut written)
            .await
        {
            Ok(removed) => {
                self.purge_objects(&removed).await;
                tracing::info!(
                    "Ad updated: ad={}, user={}, added={}, removed={}",
                    uuid,
                    user_id,
                    written.len(),
                    removed.len()
                );
                Ok(())
            }
            Err(e) => {
                log(&e);
                self.discard_written(written).await;
                Err(e)
            }
        }
    }

    async fn update_in_tx(
        &self,
        uuid: &str,
        fields: &AdFields,
        keep: &HashSet<String>,
        images: Vec<UploadedImage>,
        written: &mut Vec<StoredImage>,
    ) -> AppResult<Vec<FileRecord>> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        if !ads::update_ad_fields(&mut *tx, uuid, fields, now).await? {
            return Err(AppError::AdNotActive);
        }

        let current = files::find_files_by_ad(&mut *tx, uuid).await?;
        let (kept, to_delete): (Vec<FileRecord>, Vec<FileRecord>) =
            current.into_iter().partition(|f| keep.contains(&f.path));

        validation::validate_final_image_count(kept.len() + images.len())?;

        if !to_delete.is_empty() {
            tracing::debug!(
                "Removing images from ad {}: {}",
                uuid,
                to_delete.iter().map(|f| f.path.as_str()).join(", ")
            );
        }

        // New uploads go first: if one is rejected the rollback leaves the
        // current rows and their objects untouched.
        self.store_images(&mut tx, uuid, images, now, written)
            .await?;

        for file in &to_delete {
            files::delete_file(&mut *tx, file.id).await?;
        }

        tx.commit().await?;
        Ok(to_delete)
    }

    /// `owner` is None for system-initiated transitions.
    fn check_mutable(ad: &Ad, owner: Option<i64>) -> AppResult<()> {
        if let Some(user_id) = owner
            && ad.user_id != user_id
        {
            return Err(AppError::Forbidden(
                "Only the owner can modify this ad".to_string(),
            ));
        }

        if !ad.is_active() {
            return Err(AppError::AdNotActive);
        }

        Ok(())
    }

    pub async fn delete_ad(&self, user_id: i64, uuid: &str) -> AppResult<()> {
        self.process_removal("delete_ad", uuid, Some(user_id), AdStatus::UserDeleted)
            .await
    }

    pub async fn mark_sold(&self, user_id: i64, uuid: &str) -> AppResult<()> {
        self.process_removal("mark_sold", uuid, Some(user_id), AdStatus::Sold)
            .await
    }

    pub async fn archive_ad(&self, uuid: &str) -> AppResult<()> {
        self.process_removal("archive_ad", uuid, None, AdStatus::Expired)
            .await
    }

    /// Shared path for every terminal transition: move the ad out of active
    /// and drop its file rows in one transaction, then remove the objects.
    /// The ad row itself is kept.
    async fn process_removal(
        &self,
        operation: &str,
        uuid: &str,
        owner: Option<i64>,
        status: AdStatus,
    ) -> AppResult<()> {
        let result = async {
            let ad = ads::find_ad(self.db.as_ref(), uuid)
                .await?
                .ok_or_else(|| AppError::NotFound("Ad not found".to_string()))?;

            Self::check_mutable(&ad, owner)?;
            self.remove_in_tx(uuid, status).await
        }
        .await;

        match result {
            Ok(removed) => {
                self.purge_objects(&removed).await;
                tracing::info!(
                    "Ad {} moved to {}: files_removed={}",
                    uuid,
                    status.as_str(),
                    removed.len()
                );
                Ok(())
            }
            Err(e) => {
                log_failure(operation, Some(uuid), owner, &e);
                Err(e)
            }
        }
    }

    /// Returns the deleted file rows; their objects are removed once the
    /// transaction has committed.
    async fn remove_in_tx(&self, uuid: &str, status: AdStatus) -> AppResult<Vec<FileRecord>> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // Guarded on the active status so a racing transition loses here.
        if !ads::transition_status(&mut *tx, uuid, status, now).await? {
            return Err(AppError::AdNotActive);
        }

        let ad_files = files::find_files_by_ad(&mut *tx, uuid).await?;
        for file in &ad_files {
            files::delete_file(&mut *tx, file.id).await?;
        }

        tx.commit().await?;
        Ok(ad_files)
    }

    /// Adding an existing favorite succeeds without a second row.
    pub async fn add_favorite(&self, user_id: i64, uuid: &str) -> AppResult<()> {
        let result = async {
            let ad = ads::find_ad(self.db.as_ref(), uuid)
                .await?
                .ok_or_else(|| AppError::NotFound("Ad not found".to_string()))?;

            if !ad.is_active() {
                return Err(AppError::AdNotActive);
            }

            wishlist::add(self.db.as_ref(), user_id, uuid, Utc::now()).await
        }
        .await;

        match result {
            Ok(added) => {
                tracing::debug!("Favorite add: ad={}, user={}, new={}", uuid, user_id, added);
                Ok(())
            }
            Err(e) => {
                log_failure("add_favorite", Some(uuid), Some(user_id), &e);
                Err(e)
            }
        }
    }

    /// Removing a favorite that does not exist succeeds.
    pub async fn remove_favorite(&self, user_id: i64, uuid: &str) -> AppResult<()> {
        let removed = wishlist::remove(self.db.as_ref(), user_id, uuid)
            .await
            .inspect_err(|e| log_failure("remove_favorite", Some(uuid), Some(user_id), e))?;

        tracing::debug!(
            "Favorite remove: ad={}, user={}, existed={}",
            uuid,
            user_id,
            removed
        );
        Ok(())
    }

    /// One sequential archiver pass over active ads past their expiry.
    /// Safe to re-run: ads already out of active are skipped.
    pub async fn archive_expired(&self) -> AppResult<ArchiveReport> {
        let ids = ads::find_expired_ad_ids(self.db.as_ref(), Utc::now())
            .await
            .inspect_err(|e| log_failure("archive_expired", None, None, e))?;

        let mut report = ArchiveReport::default();

        for uuid in &ids {
            match self.archive_ad(uuid).await {
                Ok(()) => report.archived += 1,
                Err(AppError::AdNotActive) | Err(AppError::NotFound(_)) => report.skipped += 1,
                // Already logged with context; keep going with the rest.
                Err(_) => report.failed += 1,
            }
        }

        if !ids.is_empty() {
            tracing::info!(
                "Archive pass: found={}, archived={}, skipped={}, failed={}",
                ids.len(),
                report.archived,
                report.skipped,
                report.failed
            );
        }

        Ok(report)
    }
}
