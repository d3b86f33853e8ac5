//! Database models split into domain-specific modules.

pub mod amenity;
pub mod audit;
pub mod listing;
pub mod user;

pub use amenity::*;
pub use audit::*;
pub use listing::*;
pub use user::*;
