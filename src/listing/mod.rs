//! Listing lifecycle rules, independent of storage and transport.

pub mod availability;
pub mod stats;
pub mod status;

pub use availability::{availability_label, ensure_toggle_allowed, toggle_offered, AvailabilityError};
pub use stats::{count_by_status, ListingCounts};
pub use status::{ListingStatus, StatusEvent, TransitionError};
