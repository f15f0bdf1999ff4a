use sqlx::SqlitePool;

use crate::models::ad::{AdFields, MAX_IMAGES, MIN_IMAGES};
use crate::repositories::{ads, categories};
use crate::utils::error::AppResult;
use crate::utils::validation::ValidationErrors;

/// Field checks shared by create and update. The category lookup only runs
/// when the id is plausible.
pub async fn validate_fields(
    db: &SqlitePool,
    errors: &mut ValidationErrors,
    fields: &AdFields,
) -> AppResult<()> {
    if fields.title.trim().is_empty() {
        errors.add("title", "title cannot be empty");
    }

    if fields.description.trim().is_empty() {
        errors.add("description", "description cannot be empty");
    }

    // Fields that failed to parse already carry their error.
    if errors.get("price").is_none() && fields.price < 0 {
        errors.add("price", "price cannot be negative");
    }

    if errors.get("category_id").is_some() {
        return Ok(());
    }

    if fields.category_id < 1 {
        errors.add("category_id", "category_id must be >= 1");
    } else if !categories::exists(db, fields.category_id).await? {
        errors.add("category_id", "category does not exist");
    }

    Ok(())
}

fn check_image_count(errors: &mut ValidationErrors, count: usize) {
    if !(MIN_IMAGES..=MAX_IMAGES).contains(&count) {
        errors.add(
            "images",
            format!("between {} and {} images are required", MIN_IMAGES, MAX_IMAGES),
        );
    }
}

/// `errors` may already hold problems found while decoding the form.
pub async fn validate_create(
    db: &SqlitePool,
    fields: &AdFields,
    image_count: usize,
    mut errors: ValidationErrors,
) -> AppResult<()> {
    validate_fields(db, &mut errors, fields).await?;
    check_image_count(&mut errors, image_count);
    errors.into_result()?;
    Ok(())
}

/// `image_count` is the kept images plus new uploads as declared by the
/// client; the exact count is rechecked inside the update transaction.
pub async fn validate_update(
    db: &SqlitePool,
    uuid: &str,
    fields: &AdFields,
    image_count: usize,
    mut errors: ValidationErrors,
) -> AppResult<()> {
    validate_fields(db, &mut errors, fields).await?;

    if !ads::ad_exists(db, uuid).await? {
        errors.add("uuid", "ad does not exist");
    }

    check_image_count(&mut errors, image_count);
    errors.into_result()?;
    Ok(())
}

pub fn validate_final_image_count(count: usize) -> AppResult<()> {
    let mut errors = ValidationErrors::new();
    check_image_count(&mut errors, count);
    errors.into_result()?;
    Ok(())
}
