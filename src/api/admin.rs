//! Admin review queue and dashboard.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::db::{
    actions, resource_types, ListingQuery, ListingSummary, ReviewRequest, User, UserCounts,
};
use crate::listing::{ListingCounts, ListingStatus, StatusEvent};
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::error::ApiError;
use super::listings::{fetch_listing, listing_counts, query_listings};

/// Admin dashboard counters
#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub listings: ListingCounts,
    pub users: UserCounts,
}

/// All listings for review, optionally filtered by status
pub async fn list_queue(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<ListingSummary>>, ApiError> {
    Ok(Json(query_listings(&state.db, None, &query).await?))
}

/// Move a listing from `from` to `to`, provided it is still in `from`
pub(super) async fn commit_transition(
    db: &DbPool,
    id: &str,
    from: ListingStatus,
    to: ListingStatus,
) -> Result<(), ApiError> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE listings SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(&now)
        .bind(id)
        .bind(from.as_str())
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict(format!(
            "Listing is no longer {}; reload it and review again",
            from
        )));
    }
    Ok(())
}

async fn review(
    state: &AppState,
    admin: &User,
    id: &str,
    event: StatusEvent,
    reason: Option<String>,
) -> Result<ListingSummary, ApiError> {
    let listing = fetch_listing(&state.db, id).await?;
    let from = listing.status_enum();
    let to = from.apply(event)?;

    commit_transition(&state.db, &listing.id, from, to).await?;

    info!(listing_id = %listing.id, %event, %from, %to, admin_id = %admin.id, "Listing reviewed");

    let action = match event {
        StatusEvent::Approve => actions::LISTING_APPROVE,
        StatusEvent::Reject => actions::LISTING_REJECT,
        StatusEvent::Reactivate => actions::LISTING_REACTIVATE,
    };

    let mut details = serde_json::json!({ "status_from": from.as_str(), "status_to": to.as_str() });
    if let Some(reason) = reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        details["reason"] = serde_json::Value::String(reason.to_string());
    }

    audit_log(
        state,
        action,
        resource_types::LISTING,
        Some(&listing.id),
        Some(&listing.name),
        Some(&admin.id),
        Some(details),
    )
    .await;

    let updated = fetch_listing(&state.db, &listing.id).await?;
    Ok(ListingSummary::from(updated))
}

/// Approve a pending listing
pub async fn approve(
    State(state): State<Arc<AppState>>,
    admin: User,
    Path(id): Path<String>,
) -> Result<Json<ListingSummary>, ApiError> {
    Ok(Json(review(&state, &admin, &id, StatusEvent::Approve, None).await?))
}

/// Reject a pending or active listing. The body with a reason is optional.
pub async fn reject(
    State(state): State<Arc<AppState>>,
    admin: User,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<ListingSummary>, ApiError> {
    let reason = body.and_then(|Json(req)| req.reason);
    Ok(Json(review(&state, &admin, &id, StatusEvent::Reject, reason).await?))
}

/// Put a rejected listing back online
pub async fn reactivate(
    State(state): State<Arc<AppState>>,
    admin: User,
    Path(id): Path<String>,
) -> Result<Json<ListingSummary>, ApiError> {
    Ok(Json(review(&state, &admin, &id, StatusEvent::Reactivate, None).await?))
}

/// Global listing and user counts
pub async fn admin_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdminStats>, ApiError> {
    let listings = listing_counts(&state.db, None).await?;

    let (total, admins, owners): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN role = 'admin' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN role IN ('owner', 'user') THEN 1 ELSE 0 END), 0)
        FROM users
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(AdminStats {
        listings,
        users: UserCounts {
            total,
            admins,
            owners,
        },
    }))
}
