use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::AppState;
use crate::repositories::users;
use crate::utils::error::{AppError, AppResult};

const USERNAME_MAX_LENGTH: usize = 64;

#[derive(Deserialize)]
struct DevLoginRequest {
    username: String,
}

#[derive(Serialize)]
struct DevLoginResponse {
    token: String,
    user_id: i64,
}

/// Issues a token for `username`, creating the account on first use. Only
/// mounted in the dev environment.
async fn dev_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DevLoginRequest>,
) -> AppResult<Json<DevLoginResponse>> {
    let username = payload.username.trim();
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(AppError::BadRequest(format!(
            "username must be 1 to {} characters",
            USERNAME_MAX_LENGTH
        )));
    }

    let user = users::upsert_user_by_username(state.service.db().as_ref(), username, Utc::now())
        .await?;
    let token = state.jwt_service.generate_token(user.id)?;

    tracing::info!("Dev login: user={} ({})", user.id, user.username);

    Ok(Json(DevLoginResponse {
        token,
        user_id: user.id,
    }))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dev-login", post(dev_login))
        .with_state(state)
}
