//! Listing image uploads.
//!
//! Every file in a multipart request becomes one image of the listing. A
//! request that would take the listing past its image limit is rejected as a
//! whole and stores nothing.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{actions, resource_types, ListingImage, User};
use crate::storage::{self, ObjectStorage};
use crate::AppState;

use super::audit::audit_log;
use super::error::{ApiError, ErrorDetails};
use super::listings::fetch_managed_listing;

/// Extensions accepted when the client's filename has none we recognize
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// One file read from the multipart body
struct UploadedFile {
    file_name: Option<String>,
    content_type: String,
    data: Bytes,
}

impl UploadedFile {
    /// Extension for the storage key, from the filename or the content type
    fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| std::path::Path::new(name).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .filter(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()));

        from_name
            .or_else(|| {
                mime_guess::get_mime_extensions_str(&self.content_type)
                    .and_then(|exts| exts.first())
                    .map(|e| e.to_string())
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// Content type of a part: the declared one, else guessed from the filename
fn content_type_of(declared: Option<&str>, file_name: Option<&str>) -> String {
    declared
        .map(str::to_string)
        .or_else(|| {
            file_name
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|m| m.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

async fn read_files(multipart: &mut Multipart, max_bytes: usize) -> Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let file_name = field.file_name().map(str::to_string);
        if file_name.is_none() && field.content_type().is_none() {
            // Plain form field
            continue;
        }

        let content_type = content_type_of(field.content_type(), file_name.as_deref());
        let label = file_name.clone().unwrap_or_else(|| "file".to_string());

        if !content_type.starts_with("image/") {
            return Err(ApiError::validation_field(
                "images",
                format!("{} is not an image ({})", label, content_type),
            ));
        }

        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::validation_field("images", format!("{} is empty", label)));
        }
        if data.len() > max_bytes {
            return Err(ApiError::payload_too_large(format!(
                "{} is too large: {} bytes (max {})",
                label,
                data.len(),
                max_bytes
            )));
        }

        files.push(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }

    Ok(files)
}

fn image_limit_error(existing: i64, uploaded: usize, max: usize) -> ApiError {
    ApiError::bad_request(format!(
        "A listing can have at most {} images ({} already uploaded)",
        max, existing
    ))
    .with_details(ErrorDetails::ImageLimit {
        existing,
        uploaded,
        max,
    })
}

/// Best-effort removal of objects whose rows were never committed
async fn remove_objects(storage: &dyn ObjectStorage, keys: &[&str]) {
    for key in keys {
        if let Err(e) = storage.remove(key).await {
            warn!(key = %key, error = %e, "Failed to remove orphaned image object");
        }
    }
}

/// Upload one or more images for a listing.
///
/// Rows are reserved inside one transaction, each insert guarded by the
/// current image count, before any object is written. The transaction keeps
/// the SQLite write lock until commit, so concurrent uploads to the same
/// listing cannot overshoot the cap.
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<ListingImage>>), ApiError> {
    let listing = fetch_managed_listing(&state.db, &user, &id).await?;
    let max = state.config.storage.max_images_per_listing;

    let files = read_files(&mut multipart, state.config.storage.max_image_bytes).await?;
    if files.is_empty() {
        return Err(ApiError::validation_field("images", "No image provided"));
    }

    let mut tx = state.db.begin().await?;
    let mut reserved = Vec::with_capacity(files.len());
    for file in &files {
        let image_id = Uuid::new_v4().to_string();
        let key = storage::listing_image_key(&listing.id, &image_id, &file.extension());
        let url = state.storage.public_url(&key);
        let now = chrono::Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO listing_images (id, listing_id, url, storage_key, created_at)
            SELECT ?, ?, ?, ?, ?
            WHERE (SELECT COUNT(*) FROM listing_images WHERE listing_id = ?) < ?
            "#,
        )
        .bind(&image_id)
        .bind(&listing.id)
        .bind(&url)
        .bind(&key)
        .bind(&now)
        .bind(&listing.id)
        .bind(max as i64)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM listing_images WHERE listing_id = ?")
                    .bind(&listing.id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(image_limit_error(count - reserved.len() as i64, files.len(), max));
        }

        reserved.push(ListingImage {
            id: image_id,
            listing_id: listing.id.clone(),
            url,
            storage_key: key,
            created_at: now,
        });
    }

    let mut written: Vec<&str> = Vec::with_capacity(reserved.len());
    for (file, image) in files.into_iter().zip(&reserved) {
        if let Err(e) = state
            .storage
            .upload(&image.storage_key, file.data, &file.content_type)
            .await
        {
            warn!(listing_id = %listing.id, key = %image.storage_key, error = %e, "Image upload failed");
            remove_objects(state.storage.as_ref(), &written).await;
            return Err(ApiError::storage("Failed to store image"));
        }
        written.push(image.storage_key.as_str());
    }

    if let Err(e) = tx.commit().await {
        remove_objects(state.storage.as_ref(), &written).await;
        return Err(e.into());
    }

    info!(listing_id = %listing.id, count = reserved.len(), "Listing images uploaded");

    audit_log(
        &state,
        actions::IMAGE_UPLOAD,
        resource_types::LISTING,
        Some(&listing.id),
        Some(&listing.name),
        Some(&user.id),
        Some(serde_json::json!({ "count": reserved.len() })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(reserved)))
}

/// Remove one image from a listing
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    user: User,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let listing = fetch_managed_listing(&state.db, &user, &id).await?;

    let image = sqlx::query_as::<_, ListingImage>(
        "SELECT * FROM listing_images WHERE id = ? AND listing_id = ?",
    )
    .bind(&image_id)
    .bind(&listing.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Image not found"))?;

    state.storage.remove(&image.storage_key).await.map_err(|e| {
        warn!(key = %image.storage_key, error = %e, "Failed to remove image object");
        ApiError::storage("Failed to remove image")
    })?;

    sqlx::query("DELETE FROM listing_images WHERE id = ?")
        .bind(&image.id)
        .execute(&state.db)
        .await?;

    audit_log(
        &state,
        actions::IMAGE_DELETE,
        resource_types::LISTING,
        Some(&listing.id),
        Some(&listing.name),
        Some(&user.id),
        Some(serde_json::json!({ "image_id": image.id })),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
