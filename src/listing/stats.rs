//! Dashboard counters.

use serde::{Deserialize, Serialize};

use super::status::ListingStatus;

/// Listing counts shown on the dashboards.
///
/// `inactive` counts rejected listings; the dashboards have always labelled
/// them that way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCounts {
    pub total: u64,
    pub active: u64,
    pub pending: u64,
    pub inactive: u64,
}

pub fn count_by_status<I>(statuses: I) -> ListingCounts
where
    I: IntoIterator<Item = ListingStatus>,
{
    statuses
        .into_iter()
        .fold(ListingCounts::default(), |mut counts, status| {
            counts.total += 1;
            match status {
                ListingStatus::Active => counts.active += 1,
                ListingStatus::Pending => counts.pending += 1,
                ListingStatus::Rejected => counts.inactive += 1,
            }
            counts
        })
}
