//! Authentication and sessions.
//!
//! A session starts at login or registration and ends at logout or expiry.
//! Clients hold an opaque bearer token of the form `<session id>.<secret>`;
//! only the SHA-256 of the secret is stored.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::access::{self, GuardDecision, Role, RouteTarget};
use crate::db::{
    actions, resource_types, LoginRequest, LoginResponse, MeResponse, RegisterRequest, Session,
    User, UserResponse,
};
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password, validate_required_text};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token secret
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token secret for storage
fn hash_token(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create a session for `user_id` and return `(token, expires_at)`
pub async fn create_session(
    pool: &DbPool,
    user_id: &str,
    lifetime_days: i64,
) -> Result<(String, String), ApiError> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let secret = generate_secret();
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(lifetime_days)).to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(hash_token(&secret))
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok((format!("{}.{}", session_id, secret), expires_at))
}

/// Resolve a bearer token to its live session and user.
///
/// Unknown, malformed and expired tokens all yield `None`.
pub async fn resolve_session(
    pool: &DbPool,
    token: &str,
) -> Result<Option<(Session, User)>, sqlx::Error> {
    let Some((session_id, secret)) = token.split_once('.') else {
        return Ok(None);
    };

    let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;
    let Some(session) = session else {
        return Ok(None);
    };

    let presented = hash_token(secret);
    if !bool::from(presented.as_bytes().ct_eq(session.token_hash.as_bytes())) {
        return Ok(None);
    }

    let expired = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
        .map(|expires| expires < chrono::Utc::now())
        .unwrap_or(true);
    if expired {
        return Ok(None);
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    Ok(user.map(|u| (session, u)))
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = extract_token(headers).ok_or_else(|| ApiError::unauthorized("Login required"))?;
    match resolve_session(&state.db, &token).await? {
        Some((_, user)) => Ok(user),
        None => Err(ApiError::unauthorized("Session is invalid or has expired")),
    }
}

/// Extractor for the authenticated user of a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(user.clone());
        }
        current_user(state, &parts.headers).await
    }
}

/// Map a guard decision onto an API response
pub fn guard_to_result(decision: GuardDecision) -> Result<(), ApiError> {
    match decision {
        GuardDecision::Allow => Ok(()),
        GuardDecision::Redirect(RouteTarget::Login) => {
            Err(ApiError::unauthorized("Login required"))
        }
        GuardDecision::Redirect(_) => Err(ApiError::forbidden(
            "You do not have access to this resource",
        )),
    }
}

/// Require the user to hold one of `roles`
pub fn require_roles(user: &User, roles: &[Role]) -> Result<(), ApiError> {
    guard_to_result(access::evaluate(Some(&user.role), roles))
}

/// Auth middleware: resolves the session and makes the user available to
/// handlers.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_user(&state, request.headers()).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Admin area middleware. An unauthenticated or failed lookup is treated as
/// no actor.
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = match request.extensions().get::<User>() {
        Some(user) => Some(user.clone()),
        None => current_user(&state, request.headers()).await.ok(),
    };

    guard_to_result(access::evaluate(
        user.as_ref().map(|u| u.role.as_str()),
        access::ADMIN_ONLY,
    ))?;

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    Ok(next.run(request).await)
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&request.email);
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let (token, expires_at) =
        create_session(&state.db, &user.id, state.config.auth.session_days).await?;

    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at,
        home: access::home_for(&user.role).path().to_string(),
        user: UserResponse::from(user),
    }))
}

/// Self-registration. New accounts always get the `user` role.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let email = normalize_email(&request.email);

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_required_text(&request.name, "Name", 100) {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(request.name.trim())
    .bind(Role::User.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    audit_log(
        &state,
        actions::USER_REGISTER,
        resource_types::USER,
        Some(&user.id),
        Some(&user.email),
        Some(&user.id),
        None,
    )
    .await;

    let (token, expires_at) =
        create_session(&state.db, &user.id, state.config.auth.session_days).await?;

    info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            expires_at,
            home: access::home_for(&user.role).path().to_string(),
            user: UserResponse::from(user),
        }),
    ))
}

/// Current session
pub async fn me(user: User) -> Json<MeResponse> {
    Json(MeResponse {
        home: access::home_for(&user.role).path().to_string(),
        user: UserResponse::from(user),
    })
}

/// End the caller's session
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = extract_token(&headers) {
        if let Some((session_id, _)) = token.split_once('.') {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(session_id)
                .execute(&state.db)
                .await?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Create the bootstrap admin account if no admin exists yet
pub async fn ensure_admin_user(
    pool: &DbPool,
    email: &str,
    password: Option<&str>,
) -> anyhow::Result<()> {
    let (admins,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(Role::Admin.as_str())
        .fetch_one(pool)
        .await?;

    if admins > 0 {
        return Ok(());
    }

    let Some(password) = password else {
        warn!("No admin account exists and auth.admin_password is not set");
        return Ok(());
    };

    let password_hash = hash_password(password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(normalize_email(email))
    .bind(&password_hash)
    .bind("Administrator")
    .bind(Role::Admin.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!("Created bootstrap admin user: {}", email);
    Ok(())
}
