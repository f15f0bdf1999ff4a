use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::media::UploadedImage;
use crate::utils::validation::ValidationErrors;

pub const PAGE_SIZE: i64 = 20;
/// Row cap for the owner's own views, which are not paged.
pub const OWN_LIST_LIMIT: i64 = 1000;
pub const MIN_IMAGES: usize = 1;
pub const MAX_IMAGES: usize = 3;
pub const AD_LIFETIME_MONTHS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    Active,
    UserDeleted,
    Expired,
    Sold,
}

impl AdStatus {
    pub fn code(&self) -> i64 {
        match self {
            AdStatus::Active => 1,
            AdStatus::UserDeleted => 2,
            AdStatus::Expired => 3,
            AdStatus::Sold => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(AdStatus::Active),
            2 => Some(AdStatus::UserDeleted),
            3 => Some(AdStatus::Expired),
            4 => Some(AdStatus::Sold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdStatus::Active => "active",
            AdStatus::UserDeleted => "deleted",
            AdStatus::Expired => "expired",
            AdStatus::Sold => "sold",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AdStatus::Active)
    }
}

fn status_text(code: i64) -> String {
    AdStatus::from_code(code)
        .map(|s| s.as_str())
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ad {
    pub uuid: String,
    pub user_id: i64,
    pub category_id: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub status: i64,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Ad {
    pub fn status(&self) -> Option<AdStatus> {
        AdStatus::from_code(self.status)
    }

    /// Unknown status codes count as not active.
    pub fn is_active(&self) -> bool {
        self.status().is_some_and(|status| !status.is_terminal())
    }
}

/// Editable fields shared by create and update, already parsed from the
/// request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdFields {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub category_id: i64,
}

/// A decoded create or update submission. `errors` holds problems found
/// while decoding the form so they are reported together with the field
/// validation.
#[derive(Debug, Clone, Default)]
pub struct AdForm {
    pub fields: AdFields,
    /// Public URLs (or bare names) of the current images to retain. Only
    /// meaningful for updates.
    pub old_images: Vec<String>,
    pub images: Vec<UploadedImage>,
    pub errors: ValidationErrors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Column is always one of the allow-listed names, never client text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static str,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: "created_at",
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdFilter {
    pub page: i64,
    pub limit: i64,
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Defaults to active when unset.
    pub status: Option<AdStatus>,
    pub sort: SortSpec,
}

impl Default for AdFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: PAGE_SIZE,
            category_id: None,
            user_id: None,
            status: None,
            sort: SortSpec::default(),
        }
    }
}

/// Raw public listing parameters; malformed values fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdListQuery {
    pub page: Option<String>,
    pub category_id: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AdListRow {
    pub uuid: String,
    pub title: String,
    pub category_id: i64,
    pub price: i64,
    pub status: i64,
    pub created_at: String,
    pub image: String,
    pub image_storage: String,
    pub total: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AdListPage {
    pub items: Vec<AdListRow>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdListItem {
    pub uuid: String,
    pub title: String,
    pub category_id: i64,
    pub price: i64,
    pub status: String,
    pub image: Option<String>,
    pub created_at: String,
}

impl AdListItem {
    pub fn from_row(row: AdListRow, image: Option<String>) -> Self {
        Self {
            status: status_text(row.status),
            uuid: row.uuid,
            title: row.title,
            category_id: row.category_id,
            price: row.price,
            image,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdListResponse {
    pub items: Vec<AdListItem>,
    pub total: i64,
    pub limit: i64,
    pub page: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnAdsResponse {
    pub items: Vec<AdListItem>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdResponse {
    pub uuid: String,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub price: i64,
    pub status: String,
    pub created_at: String,
    pub expires_at: String,
    pub is_owner: bool,
    pub is_favorite: bool,
    pub owner_username: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdResponse {
    pub uuid: String,
}
