//! Amenity catalog endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::db::{actions, resource_types, Amenity, CreateAmenityRequest, User};
use crate::AppState;

use super::audit::audit_log;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_required_text;

/// Amenity categories the listing form groups checkboxes by
pub const CATEGORIES: &[&str] = &["room", "bathroom", "shared", "parking", "security"];

/// Derive an amenity id such as `shared-wifi` from its category and name
fn amenity_id(category: &str, name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    format!("{}-{}", category, slug)
}

/// List the catalog, grouped by category
pub async fn list_amenities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Amenity>>, ApiError> {
    let amenities = sqlx::query_as::<_, Amenity>("SELECT * FROM amenities ORDER BY category, name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(amenities))
}

/// Add an amenity to the catalog
pub async fn create_amenity(
    State(state): State<Arc<AppState>>,
    admin: User,
    Json(req): Json<CreateAmenityRequest>,
) -> Result<(StatusCode, Json<Amenity>), ApiError> {
    let name = req.name.trim();
    let category = req.category.trim().to_lowercase();

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_required_text(name, "Name", 60) {
        errors.add("name", e);
    }
    if !CATEGORIES.contains(&category.as_str()) {
        errors.add(
            "category",
            format!("Invalid category. Must be one of: {}", CATEGORIES.join(", ")),
        );
    }
    errors.finish()?;

    let amenity = Amenity {
        id: amenity_id(&category, name),
        name: name.to_string(),
        category,
    };

    sqlx::query("INSERT INTO amenities (id, name, category) VALUES (?, ?, ?)")
        .bind(&amenity.id)
        .bind(&amenity.name)
        .bind(&amenity.category)
        .execute(&state.db)
        .await?;

    info!(amenity_id = %amenity.id, "Amenity created");

    audit_log(
        &state,
        actions::AMENITY_CREATE,
        resource_types::AMENITY,
        Some(&amenity.id),
        Some(&amenity.name),
        Some(&admin.id),
        None,
    )
    .await;

    Ok((StatusCode::CREATED, Json(amenity)))
}

/// Remove an amenity and unlink it from every listing
pub async fn delete_amenity(
    State(state): State<Arc<AppState>>,
    admin: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let amenity = sqlx::query_as::<_, Amenity>("SELECT * FROM amenities WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Amenity not found"))?;

    let mut tx = state.db.begin().await?;
    let unlinked = sqlx::query("DELETE FROM listing_amenities WHERE amenity_id = ?")
        .bind(&amenity.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM amenities WHERE id = ?")
        .bind(&amenity.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(amenity_id = %amenity.id, unlinked, "Amenity deleted");

    audit_log(
        &state,
        actions::AMENITY_DELETE,
        resource_types::AMENITY,
        Some(&amenity.id),
        Some(&amenity.name),
        Some(&admin.id),
        Some(serde_json::json!({ "unlinked_listings": unlinked })),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
