//! Object storage for listing images.

mod local;

pub use local::LocalStorage;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`, replacing any existing object
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;
    /// Public URL clients use to fetch the object
    fn public_url(&self, key: &str) -> String;
    /// Remove the object. Removing a missing object is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Storage key for a listing image
pub fn listing_image_key(listing_id: &str, image_id: &str, extension: &str) -> String {
    format!("listings/{}/{}.{}", listing_id, image_id, extension)
}

/// Reject keys that could escape the storage root
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        anyhow::bail!("Invalid storage key: {}", key);
    }
    Ok(())
}
