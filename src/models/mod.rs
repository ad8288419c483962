//! Data models for the production desk.
//!
//! Records are plain data referenced by id; relationships are resolved through the repository.

mod activation;
mod assignment;
mod delivery;
mod member;
mod revision;

pub use activation::*;
pub use assignment::*;
pub use delivery::*;
pub use member::*;
pub use revision::*;

/// Lowest accepted priority (low).
pub const MIN_PRIORITY: i64 = 1;
/// Highest accepted priority (urgent).
pub const MAX_PRIORITY: i64 = 4;

/// Whether a priority value is within the 1..=4 scale shared by deliveries and activations.
pub fn is_valid_priority(priority: i64) -> bool {
    (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority)
}
