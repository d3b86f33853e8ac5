mod access;
mod admin;
mod amenities;
pub mod audit;
pub mod auth;
pub mod error;
mod images;
mod listings;
mod users;
mod validation;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

/// Multipart framing overhead allowed on top of the image payload
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let storage = &state.config.storage;
    let upload_limit = storage
        .max_image_bytes
        .saturating_mul(storage.max_images_per_listing.max(1))
        .saturating_add(MULTIPART_SLACK_BYTES);

    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register));

    // Page guard (public, resolves the session itself)
    let access_routes = Router::new().route("/check", get(access::check_access));

    // Protected API routes, any role
    let api_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Amenity catalog
        .route("/amenities", get(amenities::list_amenities))
        // Listings
        .route("/listings", get(listings::list_listings))
        .route("/listings", post(listings::create_listing))
        .route("/listings/:id", get(listings::get_listing))
        .route("/listings/:id", put(listings::update_listing))
        .route("/listings/:id", delete(listings::delete_listing))
        .route("/listings/:id/availability", put(listings::set_availability))
        // Images
        .route(
            "/listings/:id/images",
            post(images::upload_images).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/listings/:id/images/:image_id", delete(images::delete_image))
        // Dashboard
        .route("/dashboard/stats", get(listings::dashboard_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Admin routes
    let admin_routes = Router::new()
        // Review queue
        .route("/listings", get(admin::list_queue))
        .route("/listings/:id/approve", post(admin::approve))
        .route("/listings/:id/reject", post(admin::reject))
        .route("/listings/:id/reactivate", post(admin::reactivate))
        .route("/stats", get(admin::admin_stats))
        // Users
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        // Amenity catalog
        .route("/amenities", post(amenities::create_amenity))
        .route("/amenities/:id", delete(amenities::delete_amenity))
        // Audit logs
        .route("/audit-logs", get(audit::list_logs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/access", access_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::ListingForm;
    use crate::listing::ListingStatus;
    use crate::storage::LocalStorage;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const PASSWORD: &str = "rahasia123";

    async fn test_app(max_images: usize) -> (Router, Arc<AppState>, TempDir) {
        let db = crate::db::init_memory().await.unwrap();
        auth::ensure_admin_user(&db, "admin@example.com", Some(PASSWORD))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.max_images_per_listing = max_images;
        let storage = Arc::new(LocalStorage::new(dir.path(), "/uploads"));

        let state = Arc::new(AppState::new(config, db, storage));
        (create_router(state.clone()), state, dir)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn upload(app: &Router, token: &str, listing_id: &str, count: usize) -> (StatusCode, Value) {
        let boundary = "kosbalikuboundary";
        let mut body = Vec::new();
        for i in 0..count {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"kamar{}.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
                    boundary, i
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"\xff\xd8\xff\xe0 not really a jpeg");
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/listings/{}/images", listing_id))
            .header("Authorization", format!("Bearer {}", token))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register(app: &Router, email: &str) -> (String, Value) {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ibu Kos", "email": email, "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (body["token"].as_str().unwrap().to_string(), body)
    }

    async fn admin_token(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@example.com", "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    fn listing_form(name: &str) -> Value {
        json!({
            "name": name,
            "address": "Jl. Tukad Badung 12, Denpasar",
            "area": "Renon",
            "coordinates": { "lat": -8.6705, "lng": 115.2126 },
            "kos_type": "Mixed",
            "premium": true,
            "prices": [
                { "period": "monthly", "amount": 1500000 },
                { "period": "yearly", "amount": 16000000 }
            ],
            "amenity_ids": ["shared-wifi", "room-ac"]
        })
    }

    async fn create_listing(app: &Router, token: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/listings",
            Some(token),
            Some(listing_form("Kos Melati")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn count_rows(state: &AppState, table: &str, listing_id: &str) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {} WHERE listing_id = ?", table))
                .bind(listing_id)
                .fetch_one(&state.db)
                .await
                .unwrap();
        count
    }

    async fn set_status(state: &AppState, listing_id: &str, status: ListingStatus) {
        sqlx::query("UPDATE listings SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(listing_id)
            .execute(&state.db)
            .await
            .unwrap();
    }

    async fn stored_listing(state: &AppState, listing_id: &str) -> (String, bool) {
        sqlx::query_as("SELECT status, available FROM listings WHERE id = ?")
            .bind(listing_id)
            .fetch_one(&state.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _state, _dir) = test_app(10).await;
        let (status, _) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_gives_user_role_and_owner_home() {
        let (app, _state, _dir) = test_app(10).await;
        let (token, body) = register(&app, "Pemilik@Example.com").await;
        assert_eq!(body["user"]["role"], "user");
        assert_eq!(body["user"]["role_label"], "Pemilik");
        assert_eq!(body["user"]["email"], "pemilik@example.com");
        assert_eq!(body["home"], "/owner/dashboard");

        let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["home"], "/owner/dashboard");
        assert_eq!(me["user"]["role_label"], "Pemilik");

        // Same email again
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Lagi", "email": "pemilik@example.com", "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "An account with this email already exists");
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (app, _state, _dir) = test_app(10).await;
        let (token, _) = register(&app, "owner@example.com").await;

        let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_are_guarded() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;

        let (status, body) = send(&app, "GET", "/api/admin/stats", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, body) = send(&app, "GET", "/api/admin/stats", Some(&owner), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");

        let (status, body) = send(&app, "GET", "/api/admin/stats", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"]["total"], 2);
        assert_eq!(body["users"]["admins"], 1);
        assert_eq!(body["users"]["owners"], 1);

        // A bogus token counts as no actor
        let (status, _) = send(&app, "GET", "/api/admin/users", Some("nope.nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_access_check() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;

        let (_, body) = send(&app, "GET", "/api/access/check?path=/login", None, None).await;
        assert_eq!(body["allowed"], true);

        let (_, body) = send(&app, "GET", "/api/access/check?path=/admin/users", None, None).await;
        assert_eq!(body["allowed"], false);
        assert_eq!(body["redirect"], "/login");

        let (_, body) =
            send(&app, "GET", "/api/access/check?path=/admin/dashboard", Some(&owner), None).await;
        assert_eq!(body["allowed"], false);
        assert_eq!(body["redirect"], "/owner/dashboard");
        assert_eq!(body["role_label"], "Pemilik");

        let (_, body) = send(
            &app,
            "GET",
            "/api/access/check?path=/owner/listings/new",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(body["allowed"], false);
        assert_eq!(body["redirect"], "/admin/dashboard");

        let (_, body) =
            send(&app, "GET", "/api/access/check?path=/admin/users", Some(&admin), None).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["role_label"], "Admin");
    }

    #[tokio::test]
    async fn test_create_listing_starts_pending() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;

        let (status, body) =
            send(&app, "GET", &format!("/api/listings/{}", id), Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["available"], true);
        assert_eq!(body["can_toggle_availability"], false);
        assert_eq!(body["coordinates_label"], "-8.670500, 115.212600");
        assert_eq!(body["prices"][0]["period"], "monthly");
        assert_eq!(body["prices"][0]["formatted"], "Rp 1.500.000 / bulan");
        assert_eq!(body["amenities"].as_array().unwrap().len(), 2);
        assert_eq!(body["owner_name"], "Ibu Kos");

        let (_, stats) = send(&app, "GET", "/api/dashboard/stats", Some(&owner), None).await;
        assert_eq!(stats, json!({ "total": 1, "active": 0, "pending": 1, "inactive": 0 }));
    }

    #[tokio::test]
    async fn test_invalid_listing_form_is_rejected() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;

        let mut form = listing_form("");
        form["prices"] = json!([{ "period": "monthly", "amount": 0 }]);
        let (status, body) = send(&app, "POST", "/api/listings", Some(&owner), Some(form)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert!(body["error"]["details"]["name"].is_array());
        assert!(body["error"]["details"]["prices"].is_array());

        let mut form = listing_form("Kos Mawar");
        form["amenity_ids"] = json!(["no-such-amenity"]);
        let (status, _) = send(&app, "POST", "/api/listings", Some(&owner), Some(form)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, list) = send(&app, "GET", "/api/listings", Some(&owner), None).await;
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_cannot_create_listings() {
        let (app, _state, _dir) = test_app(10).await;
        let admin = admin_token(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/listings",
            Some(&admin),
            Some(listing_form("Kos Admin")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_owners_only_see_their_own_listings() {
        let (app, _state, _dir) = test_app(10).await;
        let (alice, _) = register(&app, "alice@example.com").await;
        let (bob, _) = register(&app, "bob@example.com").await;
        let admin = admin_token(&app).await;
        let id = create_listing(&app, &alice).await;

        let (status, _) = send(&app, "GET", &format!("/api/listings/{}", id), Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) =
            send(&app, "DELETE", &format!("/api/listings/{}", id), Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, list) = send(&app, "GET", "/api/listings", Some(&bob), None).await;
        assert!(list.as_array().unwrap().is_empty());

        let (status, _) =
            send(&app, "GET", &format!("/api/listings/{}", id), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, list) = send(&app, "GET", "/api/listings?search=melati", Some(&admin), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["owner_name"], "Ibu Kos");
    }

    #[tokio::test]
    async fn test_review_lifecycle() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;
        let id = create_listing(&app, &owner).await;

        let (_, queue) = send(&app, "GET", "/api/admin/listings?status=pending", Some(&admin), None).await;
        assert_eq!(queue.as_array().unwrap().len(), 1);

        // Cannot reactivate a pending listing
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/admin/listings/{}/reactivate", id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/admin/listings/{}/approve", id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");
        assert_eq!(body["can_toggle_availability"], true);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/admin/listings/{}/reject", id),
            Some(&admin),
            Some(json!({ "reason": "Foto tidak jelas" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "rejected");

        let (_, stats) = send(&app, "GET", "/api/admin/stats", Some(&admin), None).await;
        assert_eq!(stats["listings"]["inactive"], 1);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/admin/listings/{}/reactivate", id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");

        let (_, logs) = send(
            &app,
            "GET",
            "/api/admin/audit-logs?resource_type=listing",
            Some(&admin),
            None,
        )
        .await;
        assert!(logs["total"].as_i64().unwrap() >= 4);
    }

    #[tokio::test]
    async fn test_editing_rejected_listing_returns_it_to_review() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;
        let id = create_listing(&app, &owner).await;

        send(
            &app,
            "POST",
            &format!("/api/admin/listings/{}/reject", id),
            Some(&admin),
            None,
        )
        .await;

        let mut form = listing_form("Kos Melati Baru");
        form["prices"] = json!([{ "period": "weekly", "amount": 450000 }]);
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/listings/{}", id),
            Some(&owner),
            Some(form),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["name"], "Kos Melati Baru");

        // Prices are replaced wholesale
        let prices = body["prices"].as_array().unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0]["period"], "weekly");
    }

    #[tokio::test]
    async fn test_editing_active_listing_keeps_it_active() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;
        let id = create_listing(&app, &owner).await;

        send(
            &app,
            "POST",
            &format!("/api/admin/listings/{}/approve", id),
            Some(&admin),
            None,
        )
        .await;

        let (_, body) = send(
            &app,
            "PUT",
            &format!("/api/listings/{}", id),
            Some(&owner),
            Some(listing_form("Kos Melati")),
        )
        .await;
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn test_availability_requires_active_listing() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;
        let id = create_listing(&app, &owner).await;
        let uri = format!("/api/listings/{}/availability", id);

        let (status, _) =
            send(&app, "PUT", &uri, Some(&owner), Some(json!({ "available": false }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(&app, "GET", &format!("/api/listings/{}", id), Some(&owner), None).await;
        assert_eq!(body["available"], true);

        send(
            &app,
            "POST",
            &format!("/api/admin/listings/{}/approve", id),
            Some(&admin),
            None,
        )
        .await;

        let (status, body) =
            send(&app, "PUT", &uri, Some(&owner), Some(json!({ "available": false }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], false);
        assert_eq!(body["availability"], "full");
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn test_edit_resolves_status_against_stored_row() {
        let (app, state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;
        let form: ListingForm = serde_json::from_value(listing_form("Kos Melati Baru")).unwrap();
        let now = chrono::Utc::now().to_rfc3339();

        // Approved after the editor loaded it as rejected
        set_status(&state, &id, ListingStatus::Active).await;
        let mut tx = state.db.begin().await.unwrap();
        let next = listings::write_listing_edit(&mut tx, &id, &form, &now).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(next, ListingStatus::Active);
        assert_eq!(stored_listing(&state, &id).await.0, "active");

        set_status(&state, &id, ListingStatus::Rejected).await;
        let mut tx = state.db.begin().await.unwrap();
        let next = listings::write_listing_edit(&mut tx, &id, &form, &now).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(next, ListingStatus::Pending);
        assert_eq!(stored_listing(&state, &id).await.0, "pending");
    }

    #[tokio::test]
    async fn test_review_of_stale_status_conflicts() {
        let (app, state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;

        // Another admin approved it first
        set_status(&state, &id, ListingStatus::Active).await;
        let err = admin::commit_transition(
            &state.db,
            &id,
            ListingStatus::Pending,
            ListingStatus::Rejected,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(stored_listing(&state, &id).await.0, "active");

        admin::commit_transition(&state.db, &id, ListingStatus::Active, ListingStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(stored_listing(&state, &id).await.0, "rejected");
    }

    #[tokio::test]
    async fn test_availability_write_checks_stored_status() {
        let (app, state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;
        let now = chrono::Utc::now().to_rfc3339();

        // Rejected between the owner's read and the write
        set_status(&state, &id, ListingStatus::Rejected).await;
        let err = listings::write_availability(&state.db, &id, false, &now)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(stored_listing(&state, &id).await, ("rejected".to_string(), true));

        set_status(&state, &id, ListingStatus::Active).await;
        listings::write_availability(&state.db, &id, false, &now)
            .await
            .unwrap();
        assert_eq!(stored_listing(&state, &id).await, ("active".to_string(), false));
    }

    #[tokio::test]
    async fn test_image_limit_rejects_whole_upload() {
        let (app, state, dir) = test_app(2).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;

        let (status, body) = upload(&app, &owner, &id, 3).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"], json!({ "existing": 0, "uploaded": 3, "max": 2 }));
        assert_eq!(count_rows(&state, "listing_images", &id).await, 0);
        assert!(!dir.path().join("listings").exists());

        let (status, body) = upload(&app, &owner, &id, 2).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) = upload(&app, &owner, &id, 1).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(count_rows(&state, "listing_images", &id).await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_respect_image_limit() {
        let (app, state, dir) = test_app(2).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;

        let ((first, _), (second, _)) = tokio::join!(
            upload(&app, &owner, &id, 2),
            upload(&app, &owner, &id, 2)
        );

        let mut statuses = [first, second];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);
        assert_eq!(count_rows(&state, "listing_images", &id).await, 2);

        let objects = std::fs::read_dir(dir.path().join("listings").join(&id))
            .unwrap()
            .count();
        assert_eq!(objects, 2);
    }

    #[tokio::test]
    async fn test_delete_image() {
        let (app, state, dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;

        let (_, body) = upload(&app, &owner, &id, 1).await;
        let image_id = body[0]["id"].as_str().unwrap().to_string();
        let url = body[0]["url"].as_str().unwrap().to_string();
        let path = dir.path().join(url.trim_start_matches("/uploads/"));
        assert!(path.exists());

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/listings/{}/images/{}", id, image_id),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!path.exists());
        assert_eq!(count_rows(&state, "listing_images", &id).await, 0);
    }

    #[tokio::test]
    async fn test_delete_listing_removes_children() {
        let (app, state, dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let id = create_listing(&app, &owner).await;

        let (_, images) = upload(&app, &owner, &id, 2).await;
        let paths: Vec<_> = images
            .as_array()
            .unwrap()
            .iter()
            .map(|img| dir.path().join(img["url"].as_str().unwrap().trim_start_matches("/uploads/")))
            .collect();
        assert!(paths.iter().all(|p| p.exists()));

        let (status, _) =
            send(&app, "DELETE", &format!("/api/listings/{}", id), Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        for table in ["listing_prices", "listing_amenities", "listing_images"] {
            assert_eq!(count_rows(&state, table, &id).await, 0, "{} not cleared", table);
        }
        assert!(paths.iter().all(|p| !p.exists()));

        let (status, _) =
            send(&app, "GET", &format!("/api/listings/{}", id), Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_user_management() {
        let (app, _state, _dir) = test_app(10).await;
        let admin = admin_token(&app).await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/admin/users",
            Some(&admin),
            Some(json!({
                "name": "Pak Made",
                "email": "made@example.com",
                "password": PASSWORD,
                "role": "owner"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["role_label"], "Pemilik");
        let user_id = created["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            "/api/admin/users",
            Some(&admin),
            Some(json!({
                "name": "X",
                "email": "x@example.com",
                "password": PASSWORD,
                "role": "superadmin"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/admin/users/{}", user_id),
            Some(&admin),
            Some(json!({ "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["role_label"], "Admin");
        assert_eq!(updated["name"], "Pak Made");

        let (_, users) = send(&app, "GET", "/api/admin/users", Some(&admin), None).await;
        assert_eq!(users.as_array().unwrap().len(), 2);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/admin/users/{}", user_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &app,
            "GET",
            &format!("/api/admin/users/{}", user_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_user_with_listings_cannot_be_deleted() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, registered) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;
        create_listing(&app, &owner).await;

        let user_id = registered["user"]["id"].as_str().unwrap();
        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/admin/users/{}", user_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_amenity_catalog() {
        let (app, _state, _dir) = test_app(10).await;
        let (owner, _) = register(&app, "owner@example.com").await;
        let admin = admin_token(&app).await;

        let (status, catalog) = send(&app, "GET", "/api/amenities", Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let seeded = catalog.as_array().unwrap().len();
        assert!(seeded > 0);

        let (status, created) = send(
            &app,
            "POST",
            "/api/admin/amenities",
            Some(&admin),
            Some(json!({ "name": "Rooftop", "category": "shared" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], "shared-rooftop");

        let (status, body) = send(
            &app,
            "POST",
            "/api/admin/amenities",
            Some(&admin),
            Some(json!({ "name": "Rooftop", "category": "shared" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "An amenity with this name already exists");

        let (status, _) = send(
            &app,
            "POST",
            "/api/admin/amenities",
            Some(&owner),
            Some(json!({ "name": "Kolam", "category": "shared" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let id = create_listing(&app, &owner).await;
        let (status, _) = send(
            &app,
            "DELETE",
            "/api/admin/amenities/shared-wifi",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, detail) = send(&app, "GET", &format!("/api/listings/{}", id), Some(&owner), None).await;
        let amenities = detail["amenities"].as_array().unwrap();
        assert_eq!(amenities.len(), 1);
        assert_eq!(amenities[0]["id"], "room-ac");

        let (_, catalog) = send(&app, "GET", "/api/amenities", Some(&owner), None).await;
        assert_eq!(catalog.as_array().unwrap().len(), seeded);
    }
}
