//! Listing endpoints for owners.
//!
//! Owners see and manage only their own listings; admins may act on any
//! listing through the same endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Sqlite, Transaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{self, Role};
use crate::db::{
    actions, resource_types, Amenity, Listing, ListingDetail, ListingForm, ListingImage,
    ListingQuery, ListingSummary, ListingWithOwner, PriceEntry, PriceInput, PriceView,
    SetAvailabilityRequest, User,
};
use crate::listing::{self, ListingCounts, ListingStatus};
use crate::utils;
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::auth::require_roles;
use super::error::ApiError;
use super::validation::{validate_listing_form, validate_uuid};

/// Load a listing by id
pub(super) async fn fetch_listing(db: &DbPool, id: &str) -> Result<Listing, ApiError> {
    if let Err(e) = validate_uuid(id, "listing_id") {
        return Err(ApiError::validation_field("listing_id", e));
    }

    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing not found"))
}

/// Owners may manage their own listings, admins any listing
pub(super) fn ensure_can_manage(user: &User, listing: &Listing) -> Result<(), ApiError> {
    if user.is_admin() || listing.owner_id == user.id {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not own this listing"))
    }
}

/// Load a listing the caller is allowed to manage
pub(super) async fn fetch_managed_listing(
    db: &DbPool,
    user: &User,
    id: &str,
) -> Result<Listing, ApiError> {
    let listing = fetch_listing(db, id).await?;
    ensure_can_manage(user, &listing)?;
    Ok(listing)
}

/// Listing with its prices, amenities and images
pub(super) async fn fetch_detail(db: &DbPool, listing: Listing) -> Result<ListingDetail, ApiError> {
    let prices = sqlx::query_as::<_, PriceEntry>(
        r#"
        SELECT * FROM listing_prices WHERE listing_id = ?
        ORDER BY CASE period WHEN 'weekly' THEN 0 WHEN 'monthly' THEN 1 ELSE 2 END
        "#,
    )
    .bind(&listing.id)
    .fetch_all(db)
    .await?;

    let amenities = sqlx::query_as::<_, Amenity>(
        r#"
        SELECT a.* FROM amenities a
        INNER JOIN listing_amenities la ON la.amenity_id = a.id
        WHERE la.listing_id = ?
        ORDER BY a.category, a.name
        "#,
    )
    .bind(&listing.id)
    .fetch_all(db)
    .await?;

    let images = sqlx::query_as::<_, ListingImage>(
        "SELECT * FROM listing_images WHERE listing_id = ? ORDER BY created_at",
    )
    .bind(&listing.id)
    .fetch_all(db)
    .await?;

    let owner_name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = ?")
        .bind(&listing.owner_id)
        .fetch_optional(db)
        .await?;

    let coordinates = listing.coordinates();
    let status = listing.status_enum();

    Ok(ListingDetail {
        coordinates_label: coordinates.as_ref().map(utils::format_coordinates),
        coordinates,
        owner_name,
        availability: listing::availability_label(listing.available),
        can_toggle_availability: listing::toggle_offered(status),
        prices: prices.into_iter().map(PriceView::from).collect(),
        amenities,
        images,
        listing,
    })
}

/// List listings, optionally restricted to one owner
pub(super) async fn query_listings(
    db: &DbPool,
    owner_id: Option<&str>,
    query: &ListingQuery,
) -> Result<Vec<ListingSummary>, ApiError> {
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(owner_id) = owner_id {
        conditions.push("l.owner_id = ?");
        bindings.push(owner_id.to_string());
    }

    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: ListingStatus = status
            .parse()
            .map_err(|e: String| ApiError::validation_field("status", e))?;
        conditions.push("l.status = ?");
        bindings.push(status.to_string());
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(l.name LIKE ? OR l.address LIKE ? OR l.area LIKE ?)");
        let pattern = format!("%{}%", search);
        bindings.extend(std::iter::repeat(pattern).take(3));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        r#"
        SELECT l.*, u.name AS owner_name FROM listings l
        LEFT JOIN users u ON u.id = l.owner_id
        {}
        ORDER BY l.created_at DESC
        "#,
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, ListingWithOwner>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }

    let rows = query_builder.fetch_all(db).await?;
    Ok(rows.into_iter().map(ListingSummary::from).collect())
}

/// Status counts over all listings, or one owner's listings
pub(super) async fn listing_counts(
    db: &DbPool,
    owner_id: Option<&str>,
) -> Result<ListingCounts, ApiError> {
    let statuses: Vec<String> = match owner_id {
        Some(owner_id) => {
            sqlx::query_scalar("SELECT status FROM listings WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_all(db)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT status FROM listings")
                .fetch_all(db)
                .await?
        }
    };

    Ok(listing::count_by_status(
        statuses
            .iter()
            .map(|s| s.parse::<ListingStatus>().unwrap_or_default()),
    ))
}

/// Replace all price entries of a listing
async fn replace_prices(
    tx: &mut Transaction<'_, Sqlite>,
    listing_id: &str,
    prices: &[PriceInput],
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM listing_prices WHERE listing_id = ?")
        .bind(listing_id)
        .execute(&mut **tx)
        .await?;

    for price in prices {
        sqlx::query("INSERT INTO listing_prices (id, listing_id, period, amount) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(listing_id)
            .bind(price.period.as_str())
            .bind(price.amount)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

/// Replace all amenity links of a listing. Unknown amenity ids are rejected.
async fn replace_amenities(
    tx: &mut Transaction<'_, Sqlite>,
    listing_id: &str,
    amenity_ids: &[String],
) -> Result<(), ApiError> {
    let unique: BTreeSet<&str> = amenity_ids.iter().map(String::as_str).collect();

    for amenity_id in &unique {
        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM amenities WHERE id = ?")
            .bind(amenity_id)
            .fetch_optional(&mut **tx)
            .await?;
        if exists.is_none() {
            return Err(ApiError::validation_field(
                "amenity_ids",
                format!("Unknown amenity: {}", amenity_id),
            ));
        }
    }

    sqlx::query("DELETE FROM listing_amenities WHERE listing_id = ?")
        .bind(listing_id)
        .execute(&mut **tx)
        .await?;

    for amenity_id in unique {
        sqlx::query("INSERT INTO listing_amenities (listing_id, amenity_id) VALUES (?, ?)")
            .bind(listing_id)
            .bind(amenity_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// List the caller's listings (all listings for admins)
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<ListingSummary>>, ApiError> {
    let owner = if user.is_admin() { None } else { Some(user.id.as_str()) };
    let listings = query_listings(&state.db, owner, &query).await?;
    Ok(Json(listings))
}

/// Get a listing with everything it owns
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ListingDetail>, ApiError> {
    let listing = fetch_managed_listing(&state.db, &user, &id).await?;
    Ok(Json(fetch_detail(&state.db, listing).await?))
}

/// Create a listing. New listings always start in review.
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(form): Json<ListingForm>,
) -> Result<(StatusCode, Json<ListingDetail>), ApiError> {
    require_roles(&user, access::OWNER_AREA)?;
    validate_listing_form(&form)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO listings (
            id, owner_id, name, address, area, latitude, longitude, kos_type,
            premium, rules, notes, available, status, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(form.name.trim())
    .bind(form.address.trim())
    .bind(form.area.trim())
    .bind(form.coordinates.map(|c| c.lat))
    .bind(form.coordinates.map(|c| c.lng))
    .bind(form.kos_type.to_string())
    .bind(form.premium)
    .bind(trimmed(&form.rules))
    .bind(trimmed(&form.notes))
    .bind(ListingStatus::Pending.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    replace_prices(&mut tx, &id, &form.prices).await?;
    replace_amenities(&mut tx, &id, &form.amenity_ids).await?;

    tx.commit().await?;

    let listing = fetch_listing(&state.db, &id).await?;
    info!(listing_id = %id, owner_id = %user.id, "Listing created");

    audit_log(
        &state,
        actions::LISTING_CREATE,
        resource_types::LISTING,
        Some(&listing.id),
        Some(&listing.name),
        Some(&user.id),
        None,
    )
    .await;

    Ok((StatusCode::CREATED, Json(fetch_detail(&state.db, listing).await?)))
}

/// Write the edited fields of a listing.
///
/// The status is resolved against the stored row in the same statement: a
/// rejected listing goes back to review, anything else keeps its status.
/// Returns the status after the write.
pub(super) async fn write_listing_edit(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
    form: &ListingForm,
    now: &str,
) -> Result<ListingStatus, ApiError> {
    let (status,): (String,) = sqlx::query_as(
        r#"
        UPDATE listings SET
            name = ?,
            address = ?,
            area = ?,
            latitude = ?,
            longitude = ?,
            kos_type = ?,
            premium = ?,
            rules = ?,
            notes = ?,
            status = CASE WHEN status = ? THEN ? ELSE status END,
            updated_at = ?
        WHERE id = ?
        RETURNING status
        "#,
    )
    .bind(form.name.trim())
    .bind(form.address.trim())
    .bind(form.area.trim())
    .bind(form.coordinates.map(|c| c.lat))
    .bind(form.coordinates.map(|c| c.lng))
    .bind(form.kos_type.to_string())
    .bind(form.premium)
    .bind(trimmed(&form.rules))
    .bind(trimmed(&form.notes))
    .bind(ListingStatus::Rejected.as_str())
    .bind(ListingStatus::Rejected.after_edit().as_str())
    .bind(now)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Listing not found"))?;

    Ok(status.parse().unwrap_or_default())
}

/// Save an edit of a listing.
///
/// Prices and amenity links are replaced wholesale. Saving a rejected
/// listing puts it back into review.
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(form): Json<ListingForm>,
) -> Result<Json<ListingDetail>, ApiError> {
    validate_listing_form(&form)?;

    let existing = fetch_managed_listing(&state.db, &user, &id).await?;
    let previous = existing.status_enum();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;
    let next = write_listing_edit(&mut tx, &id, &form, &now).await?;
    replace_prices(&mut tx, &id, &form.prices).await?;
    replace_amenities(&mut tx, &id, &form.amenity_ids).await?;
    tx.commit().await?;

    if previous != next {
        info!(listing_id = %id, from = %previous, to = %next, "Edited listing returned to review");
    }

    let listing = fetch_listing(&state.db, &id).await?;

    audit_log(
        &state,
        actions::LISTING_UPDATE,
        resource_types::LISTING,
        Some(&listing.id),
        Some(&listing.name),
        Some(&user.id),
        (previous != next).then(|| {
            serde_json::json!({ "status_from": previous.as_str(), "status_to": next.as_str() })
        }),
    )
    .await;

    Ok(Json(fetch_detail(&state.db, listing).await?))
}

/// Delete a listing together with its prices, amenity links and images
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let listing = fetch_managed_listing(&state.db, &user, &id).await?;

    let mut tx = state.db.begin().await?;
    let images = sqlx::query_as::<_, ListingImage>("SELECT * FROM listing_images WHERE listing_id = ?")
        .bind(&id)
        .fetch_all(&mut *tx)
        .await?;
    for table in ["listing_prices", "listing_amenities", "listing_images"] {
        sqlx::query(&format!("DELETE FROM {} WHERE listing_id = ?", table))
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }
    let result = sqlx::query("DELETE FROM listings WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Listing not found"));
    }
    tx.commit().await?;

    for image in &images {
        if let Err(e) = state.storage.remove(&image.storage_key).await {
            warn!(listing_id = %id, key = %image.storage_key, error = %e, "Failed to remove image object");
        }
    }

    info!(listing_id = %id, images = images.len(), "Listing deleted");

    audit_log(
        &state,
        actions::LISTING_DELETE,
        resource_types::LISTING,
        Some(&listing.id),
        Some(&listing.name),
        Some(&user.id),
        None,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Write the occupancy flag, but only while the stored listing is active
pub(super) async fn write_availability(
    db: &DbPool,
    id: &str,
    available: bool,
    now: &str,
) -> Result<(), ApiError> {
    let result = sqlx::query(
        "UPDATE listings SET available = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(available)
    .bind(now)
    .bind(id)
    .bind(ListingStatus::Active.as_str())
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        let current = fetch_listing(db, id).await?;
        listing::ensure_toggle_allowed(current.status_enum())?;
    }
    Ok(())
}

/// Flip the occupancy flag of an active listing
pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<SetAvailabilityRequest>,
) -> Result<Json<ListingSummary>, ApiError> {
    let listing = fetch_managed_listing(&state.db, &user, &id).await?;
    listing::ensure_toggle_allowed(listing.status_enum())?;

    let now = chrono::Utc::now().to_rfc3339();
    write_availability(&state.db, &id, req.available, &now).await?;

    let listing = fetch_listing(&state.db, &id).await?;

    audit_log(
        &state,
        actions::LISTING_AVAILABILITY,
        resource_types::LISTING,
        Some(&listing.id),
        Some(&listing.name),
        Some(&user.id),
        Some(serde_json::json!({ "available": req.available })),
    )
    .await;

    Ok(Json(ListingSummary::from(listing)))
}

/// Dashboard counters: the caller's listings, or every listing for admins
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ListingCounts>, ApiError> {
    let owner = match user.role_enum() {
        Some(Role::Admin) => None,
        _ => Some(user.id.as_str()),
    };
    Ok(Json(listing_counts(&state.db, owner).await?))
}
