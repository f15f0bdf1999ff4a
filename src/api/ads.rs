use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    routing::{get, post},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{AppState, MAX_REQUEST_SIZE};
use crate::media::{MAX_UPLOAD_SIZE, UploadedImage};
use crate::models::ad::{
    AdForm, AdListQuery, AdListResponse, AdResponse, CreateAdResponse, OwnAdsResponse,
};
use crate::models::user::CurrentUser;
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::parse_int_field;

fn parse_ad_id(raw: &str) -> AppResult<String> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| AppError::BadRequest(format!("Invalid ad id: {}", raw)))
}

fn multipart_error(err: multer::Error) -> AppError {
    match err {
        multer::Error::FieldSizeExceeded { field_name, .. } => AppError::BadRequest(format!(
            "Field {} exceeds the {} byte limit",
            field_name.unwrap_or_default(),
            MAX_UPLOAD_SIZE
        )),
        multer::Error::StreamSizeExceeded { .. } => AppError::BadRequest(format!(
            "Request exceeds the {} byte limit",
            MAX_REQUEST_SIZE
        )),
        other => AppError::BadRequest(format!("Invalid multipart body: {}", other)),
    }
}

/// Decodes the ad form. Integer fields that do not parse are recorded as
/// validation errors instead of failing the request outright.
async fn read_ad_form(headers: &HeaderMap, body: Body) -> AppResult<AdForm> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Expected multipart/form-data".to_string()))?;

    let boundary = multer::parse_boundary(content_type).map_err(multipart_error)?;

    let constraints = multer::Constraints::new().size_limit(
        multer::SizeLimit::new()
            .whole_stream(MAX_REQUEST_SIZE as u64)
            .per_field(MAX_UPLOAD_SIZE as u64),
    );

    let mut multipart =
        multer::Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    let mut form = AdForm::default();
    let mut price = None;
    let mut category_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "images" | "images[]" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;

                // Browsers send an empty, unnamed part for an untouched file input.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }

                form.images.push(UploadedImage {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            "old_images" | "old_images[]" => {
                let value = field.text().await.map_err(multipart_error)?;
                if !value.trim().is_empty() {
                    form.old_images.push(value);
                }
            }
            "title" => form.fields.title = field.text().await.map_err(multipart_error)?,
            "description" => {
                form.fields.description = field.text().await.map_err(multipart_error)?
            }
            "price" => price = Some(field.text().await.map_err(multipart_error)?),
            "category_id" => category_id = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!("Ignoring unknown form field: {}", other),
        }
    }

    form.fields.price = parse_int_field(&mut form.errors, "price", price.as_deref(), true, 0);
    form.fields.category_id = parse_int_field(
        &mut form.errors,
        "category_id",
        category_id.as_deref(),
        true,
        0,
    );

    Ok(form)
}

async fn list_ads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdListQuery>,
) -> AppResult<Json<AdListResponse>> {
    Ok(Json(state.service.list_ads(&query).await?))
}

async fn my_ads(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<OwnAdsResponse>> {
    Ok(Json(state.service.my_ads(user.id).await?))
}

async fn my_sold_ads(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<OwnAdsResponse>> {
    Ok(Json(state.service.my_sold_ads(user.id).await?))
}

async fn my_favorite_ads(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<OwnAdsResponse>> {
    Ok(Json(state.service.my_favorite_ads(user.id).await?))
}

async fn get_ad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(ad_id): Path<String>,
) -> AppResult<Json<AdResponse>> {
    let uuid = parse_ad_id(&ad_id)?;
    Ok(Json(state.service.get_ad(user.id, &uuid).await?))
}

async fn create_ad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    body: Body,
) -> AppResult<Json<CreateAdResponse>> {
    let form = read_ad_form(&headers, body).await?;
    Ok(Json(state.service.create_ad(user.id, form).await?))
}

async fn update_ad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(ad_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> AppResult<Json<serde_json::Value>> {
    let uuid = parse_ad_id(&ad_id)?;
    let form = read_ad_form(&headers, body).await?;
    state.service.update_ad(user.id, &uuid, form).await?;
    Ok(Json(serde_json::json!({"success": true, "uuid": uuid})))
}

async fn delete_ad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(ad_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let uuid = parse_ad_id(&ad_id)?;
    state.service.delete_ad(user.id, &uuid).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn mark_sold(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(ad_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let uuid = parse_ad_id(&ad_id)?;
    state.service.mark_sold(user.id, &uuid).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(ad_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let uuid = parse_ad_id(&ad_id)?;
    state.service.add_favorite(user.id, &uuid).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(ad_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let uuid = parse_ad_id(&ad_id)?;
    state.service.remove_favorite(user.id, &uuid).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

pub fn public_routes(state: Arc<AppState>) -> Router {
    Router::new().route("/", get(list_ads)).with_state(state)
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create_ad))
        .route("/my", get(my_ads))
        .route("/my/sold", get(my_sold_ads))
        .route("/my/favorites", get(my_favorite_ads))
        .route("/:uuid", get(get_ad).put(update_ad).delete(delete_ad))
        .route("/:uuid/sold", post(mark_sold))
        .route("/:uuid/favorite", post(add_favorite).delete(remove_favorite))
        .with_state(state)
}
