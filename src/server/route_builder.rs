use anyhow::Context;
use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::api::{AppState, MAX_REQUEST_SIZE};
use crate::config::AppConfig;
use crate::database;
use crate::services::AdService;
use crate::storage::{ImageStorage, LocalStorage, S3Storage, StorageKind, StorageSet};
use crate::utils::jwt::JwtService;

/// The local backend is always registered so rows written before a switch
/// to S3 still resolve; S3 is registered whenever it is configured.
pub async fn build_storages(config: &AppConfig) -> anyhow::Result<StorageSet> {
    let local: Arc<dyn ImageStorage> = Arc::new(
        LocalStorage::new(&config.upload_dir, &config.public_files_base_url)
            .await
            .with_context(|| format!("Failed to prepare upload dir {}", config.upload_dir))?,
    );

    let s3: Option<Arc<dyn ImageStorage>> = match &config.s3 {
        Some(s3_config) => Some(Arc::new(
            S3Storage::new(s3_config).context("Failed to configure S3 storage")?,
        )),
        None => None,
    };

    let storages = match (config.storage_type, s3) {
        (StorageKind::S3, Some(s3)) => StorageSet::new(s3).with_backend(local),
        (StorageKind::S3, None) => anyhow::bail!("STORAGE_TYPE=s3 requires S3 settings"),
        (StorageKind::Local, Some(s3)) => StorageSet::new(local).with_backend(s3),
        (StorageKind::Local, None) => StorageSet::new(local),
    };

    tracing::info!("Uploads go to the {} backend", config.storage_type);

    Ok(storages)
}

pub async fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let db = database::create_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    tracing::info!("Database connected and migrations applied");

    let storages = build_storages(&config).await?;
    let jwt_service = Arc::new(JwtService::new(&config.secret_key));

    Ok(Arc::new(AppState {
        service: AdService::new(db, storages),
        jwt_service,
        config: Arc::new(config),
    }))
}

pub fn register_routes(state: Arc<AppState>) -> Router {
    let upload_dir = state.config.upload_dir.clone();
    let api_routes = crate::api::routes(state);

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
