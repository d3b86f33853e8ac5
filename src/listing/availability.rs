//! Owner-controlled occupancy flag.

use thiserror::Error;

use super::status::ListingStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AvailabilityError {
    #[error("availability can only be changed while the listing is active (currently {0})")]
    NotActive(ListingStatus),
}

/// Check whether availability may be written for a listing in `status`.
pub fn ensure_toggle_allowed(status: ListingStatus) -> Result<(), AvailabilityError> {
    match status {
        ListingStatus::Active => Ok(()),
        other => Err(AvailabilityError::NotActive(other)),
    }
}

/// Whether the dashboard should offer the toggle at all
pub fn toggle_offered(status: ListingStatus) -> bool {
    ensure_toggle_allowed(status).is_ok()
}

/// Availability as shown on the listing card
pub fn availability_label(available: bool) -> &'static str {
    if available {
        "available"
    } else {
        "full"
    }
}
