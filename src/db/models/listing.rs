//! Listing (kos) models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::amenity::Amenity;
use crate::listing::{self, ListingStatus};
use crate::utils;

/// Occupant type of a kos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KosType {
    A,
    B,
    Mixed,
}

impl std::fmt::Display for KosType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::Mixed => write!(f, "Mixed"),
        }
    }
}

impl std::str::FromStr for KosType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "Mixed" => Ok(Self::Mixed),
            _ => Err(format!("Unknown kos type: {}", s)),
        }
    }
}

/// Billing period of a price entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricePeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl PricePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for PricePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PricePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown price period: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub address: String,
    pub area: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub kos_type: String,
    pub premium: bool,
    pub rules: Option<String>,
    pub notes: Option<String>,
    pub available: bool,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Listing {
    /// Parsed status. Rows are only ever written through [`ListingStatus`],
    /// so an unknown value is treated as awaiting review.
    pub fn status_enum(&self) -> ListingStatus {
        self.status.parse().unwrap_or_default()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// A point picked on the map widget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceEntry {
    pub id: String,
    pub listing_id: String,
    pub period: String,
    pub amount: i64,
}

impl PriceEntry {
    pub fn period_enum(&self) -> Option<PricePeriod> {
        self.period.parse().ok()
    }
}

/// Price entry with its display string
#[derive(Debug, Clone, Serialize)]
pub struct PriceView {
    pub id: String,
    pub period: String,
    pub amount: i64,
    pub formatted: String,
}

impl From<PriceEntry> for PriceView {
    fn from(p: PriceEntry) -> Self {
        let formatted = match p.period_enum() {
            Some(period) => utils::format_price(p.amount, period),
            None => utils::format_rupiah(p.amount),
        };
        Self {
            id: p.id,
            period: p.period,
            amount: p.amount,
            formatted,
        }
    }
}

/// Price as submitted by the listing form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceInput {
    pub period: PricePeriod,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ListingImage {
    pub id: String,
    pub listing_id: String,
    pub url: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub created_at: String,
}

/// Listing form payload used for both create and update.
///
/// Updates replace the listing's prices and amenity links wholesale, so the
/// full form is always submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingForm {
    pub name: String,
    pub address: String,
    pub area: String,
    pub coordinates: Option<Coordinates>,
    pub kos_type: KosType,
    #[serde(default)]
    pub premium: bool,
    pub rules: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub prices: Vec<PriceInput>,
    #[serde(default)]
    pub amenity_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub available: bool,
}

/// Optional body for admin review actions
#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub status: Option<String>,
    /// Case-insensitive match on name, address or area
    pub search: Option<String>,
}

/// Listing joined with its owner's name
#[derive(Debug, Clone, FromRow)]
pub struct ListingWithOwner {
    #[sqlx(flatten)]
    pub listing: Listing,
    pub owner_name: Option<String>,
}

/// Listing row as shown in list views
#[derive(Debug, Clone, Serialize)]
pub struct ListingSummary {
    pub id: String,
    pub owner_id: String,
    pub owner_name: Option<String>,
    pub name: String,
    pub area: String,
    pub kos_type: String,
    pub premium: bool,
    pub status: String,
    pub available: bool,
    pub availability: &'static str,
    /// Whether the owner may currently flip availability
    pub can_toggle_availability: bool,
    pub updated_at: String,
}

impl From<Listing> for ListingSummary {
    fn from(l: Listing) -> Self {
        let status = l.status_enum();
        Self {
            availability: listing::availability_label(l.available),
            can_toggle_availability: listing::toggle_offered(status),
            id: l.id,
            owner_id: l.owner_id,
            owner_name: None,
            name: l.name,
            area: l.area,
            kos_type: l.kos_type,
            premium: l.premium,
            status: l.status,
            available: l.available,
            updated_at: l.updated_at,
        }
    }
}

impl From<ListingWithOwner> for ListingSummary {
    fn from(row: ListingWithOwner) -> Self {
        let mut summary = ListingSummary::from(row.listing);
        summary.owner_name = row.owner_name;
        summary
    }
}

/// Listing with everything it owns, for detail and edit views
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub coordinates: Option<Coordinates>,
    /// Coordinates as shown under the map marker
    pub coordinates_label: Option<String>,
    pub owner_name: Option<String>,
    pub availability: &'static str,
    pub can_toggle_availability: bool,
    pub prices: Vec<PriceView>,
    pub amenities: Vec<Amenity>,
    pub images: Vec<ListingImage>,
}
