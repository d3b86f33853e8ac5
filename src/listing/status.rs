//! Listing approval lifecycle.
//!
//! Admins move listings between `pending`, `active` and `rejected` with
//! explicit review events. Owners never set the status directly, but saving
//! an edit to a rejected listing sends it back to `pending` for review.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Pending,
    Active,
    Rejected,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
        }
    }

    /// Apply an admin review event.
    pub fn apply(self, event: StatusEvent) -> Result<ListingStatus, TransitionError> {
        use ListingStatus::*;
        use StatusEvent::*;

        match (self, event) {
            (Pending, Approve) => Ok(Active),
            (Pending, Reject) | (Active, Reject) => Ok(Rejected),
            (Rejected, Reactivate) => Ok(Active),
            (from, event) => Err(TransitionError::Invalid { from, event }),
        }
    }

    /// Status a listing takes when its owner saves an edit. A rejected
    /// listing goes back into the review queue; otherwise nothing changes.
    pub fn after_edit(self) -> ListingStatus {
        match self {
            Self::Rejected => Self::Pending,
            other => other,
        }
    }
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown listing status: {}", s)),
        }
    }
}

/// Admin review actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusEvent {
    Approve,
    Reject,
    Reactivate,
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::Reactivate => write!(f, "reactivate"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {event} a listing that is {from}")]
    Invalid {
        from: ListingStatus,
        event: StatusEvent,
    },
}
