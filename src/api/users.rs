//! Account management for admins.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::access::Role;
use crate::db::{actions, resource_types, CreateUserRequest, UpdateUserRequest, User, UserResponse};
use crate::AppState;

use super::audit::audit_log;
use super::auth::{hash_password, normalize_email};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password, validate_required_text, validate_uuid};

/// Validate a role string
fn validate_role(role: &str) -> Result<Role, String> {
    role.parse::<Role>()
        .map_err(|_| "Invalid role. Must be one of: admin, owner, user".to_string())
}

async fn fetch_user(state: &AppState, id: &str) -> Result<User, ApiError> {
    if let Err(e) = validate_uuid(id, "user_id") {
        return Err(ApiError::validation_field("user_id", e));
    }

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// List all accounts
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get one account
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(UserResponse::from(fetch_user(&state, &id).await?)))
}

/// Create an account with any role
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    admin: User,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let email = normalize_email(&req.email);

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_required_text(&req.name, "Name", 100) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    let role = match validate_role(&req.role) {
        Ok(role) => Some(role),
        Err(e) => {
            errors.add("role", e);
            None
        }
    };
    errors.finish()?;
    let role = role.unwrap_or(Role::User);

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(req.name.trim())
    .bind(role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let user = fetch_user(&state, &id).await?;
    info!(user_id = %user.id, role = %user.role, "User created");

    audit_log(
        &state,
        actions::USER_CREATE,
        resource_types::USER,
        Some(&user.id),
        Some(&user.email),
        Some(&admin.id),
        Some(serde_json::json!({ "role": user.role })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Edit an account. Omitted fields keep their value.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let existing = fetch_user(&state, &id).await?;
    let email = req.email.as_deref().map(normalize_email);

    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref name) = req.name {
        if let Err(e) = validate_required_text(name, "Name", 100) {
            errors.add("name", e);
        }
    }
    if let Some(ref email) = email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    if let Some(ref password) = req.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", e);
        }
    }
    let role = match req.role.as_deref().map(validate_role) {
        Some(Ok(role)) => Some(role),
        Some(Err(e)) => {
            errors.add("role", e);
            None
        }
        None => None,
    };
    errors.finish()?;

    if existing.id == admin.id && role.is_some_and(|r| r != Role::Admin) {
        return Err(ApiError::conflict("You cannot remove your own admin role"));
    }

    let password_hash = match req.password {
        Some(ref password) => Some(
            hash_password(password)
                .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?,
        ),
        None => None,
    };

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            email = COALESCE(?, email),
            password_hash = COALESCE(?, password_hash),
            role = COALESCE(?, role),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(req.name.as_deref().map(str::trim))
    .bind(&email)
    .bind(&password_hash)
    .bind(role.map(|r| r.as_str()))
    .bind(&now)
    .bind(&existing.id)
    .execute(&state.db)
    .await?;

    // A password change ends every session of that account
    if password_hash.is_some() {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(&existing.id)
            .execute(&state.db)
            .await?;
    }

    let user = fetch_user(&state, &existing.id).await?;

    let mut changed = Vec::new();
    if req.name.is_some() {
        changed.push("name");
    }
    if email.is_some() {
        changed.push("email");
    }
    if password_hash.is_some() {
        changed.push("password");
    }
    if role.is_some() {
        changed.push("role");
    }

    audit_log(
        &state,
        actions::USER_UPDATE,
        resource_types::USER,
        Some(&user.id),
        Some(&user.email),
        Some(&admin.id),
        Some(serde_json::json!({ "changed": changed })),
    )
    .await;

    Ok(Json(UserResponse::from(user)))
}

/// Delete an account. Accounts that still own listings cannot be deleted.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = fetch_user(&state, &id).await?;

    if user.id == admin.id {
        return Err(ApiError::conflict("You cannot delete your own account"));
    }

    let (listings,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM listings WHERE owner_id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;
    if listings > 0 {
        return Err(ApiError::conflict(format!(
            "This account still owns {} listing(s)",
            listings
        )));
    }

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    info!(user_id = %user.id, "User deleted");

    audit_log(
        &state,
        actions::USER_DELETE,
        resource_types::USER,
        Some(&user.id),
        Some(&user.email),
        Some(&admin.id),
        None,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
