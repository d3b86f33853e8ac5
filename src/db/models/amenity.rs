//! Amenity (fasilitas) catalog.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Amenity {
    pub id: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAmenityRequest {
    pub name: String,
    pub category: String,
}
