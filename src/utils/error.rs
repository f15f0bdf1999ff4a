use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::MediaError;
use crate::storage::StorageError;
use crate::utils::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Image error: {0}")]
    Media(#[from] MediaError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ad is not active")]
    AdNotActive,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Dependency failures: the caller only sees a generic failure and the
    /// full error belongs in the error log.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Storage(_) => "storage_error",
            AppError::Media(_) => "media_error",
            AppError::Auth(_) => "auth_error",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::AdNotActive => "not_active",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_type = self.kind().to_string();

        let (status, message, fields) = match self {
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                // Already logged with operation context by the service layer.
                tracing::debug!("Internal failure returned to client: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
            AppError::Media(ref e) => {
                tracing::debug!("Media error: {}", e);
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), None)
            }
            AppError::Auth(ref msg) => {
                tracing::debug!("Auth error: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone(), None)
            }
            AppError::Forbidden(ref msg) => {
                tracing::debug!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone(), None)
            }
            AppError::NotFound(ref msg) => {
                tracing::debug!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone(), None)
            }
            AppError::AdNotActive => (StatusCode::NOT_FOUND, self.to_string(), None),
            AppError::BadRequest(ref msg) => {
                tracing::debug!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                serde_json::to_value(&errors).ok(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_type,
            message,
            fields,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_classification() {
        assert!(AppError::Internal("boom".to_string()).is_internal());
        assert!(AppError::Storage(StorageError::Backend("s3 down".to_string())).is_internal());
        assert!(!AppError::AdNotActive.is_internal());
        assert!(!AppError::Forbidden("nope".to_string()).is_internal());
        assert!(!AppError::Validation(ValidationErrors::new()).is_internal());
    }

    #[test]
    fn test_not_active_is_distinct_from_not_found() {
        let not_found = AppError::NotFound("Ad not found".to_string());
        assert_ne!(not_found.kind(), AppError::AdNotActive.kind());
        assert_eq!(
            not_found.into_response().status(),
            AppError::AdNotActive.into_response().status()
        );
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "title cannot be empty");
        let response = AppError::Validation(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
