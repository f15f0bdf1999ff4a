pub mod ads;
pub mod auth;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::media::MAX_UPLOAD_SIZE;
use crate::models::ad::MAX_IMAGES;
use crate::services::AdService;
use crate::utils::jwt::JwtService;

/// Request body ceiling: every allowed image at full size plus the text
/// fields. Shared by the router body limit and the multipart reader.
pub const MAX_REQUEST_SIZE: usize = MAX_IMAGES * MAX_UPLOAD_SIZE + 1024 * 1024;

pub struct AppState {
    pub service: AdService,
    pub jwt_service: Arc<JwtService>,
    pub config: Arc<AppConfig>,
}

async fn health_check() -> &'static str {
    "OK"
}

pub fn routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .nest("/ads", ads::routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/ads", ads::public_routes(state.clone()))
        .merge(protected_routes);

    if state.config.is_dev() {
        router = router.nest("/auth", auth::routes(state.clone()));
    }

    router
}
