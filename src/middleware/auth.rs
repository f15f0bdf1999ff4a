use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::AppState;
use crate::models::user::CurrentUser;
use crate::repositories::users;
use crate::utils::error::AppError;

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Auth("Missing or invalid authorization header".to_string()))?;

    let user_id = state.jwt_service.extract_user_id(token)?;

    let exists = users::user_exists(state.service.db().as_ref(), user_id)
        .await
        .map_err(|e| {
            tracing::error!("User lookup failed during auth check: user={}, error={}", user_id, e);
            AppError::Internal("Database error during auth check".to_string())
        })?;

    if !exists {
        return Err(AppError::Auth("User no longer exists".to_string()));
    }

    request.extensions_mut().insert(CurrentUser { id: user_id });

    Ok(next.run(request).await)
}
