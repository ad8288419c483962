//! Production desk workflows.
//!
//! Each operation runs in one database transaction. Rule violations come back as values
//! (`None`, `false`, an outcome enum); only persistence failures and malformed input are errors.

mod activations;
mod assignments;
mod conflicts;
mod deliveries;
mod evidence;

pub use activations::*;
pub use assignments::*;
pub use conflicts::*;
pub use deliveries::*;
pub use evidence::*;
