//! Services layer - Business logic
//!
//! Services validate input, call into the repositories and translate storage
//! results into domain outcomes.

pub mod tag;

pub use tag::{TagService, TagServiceError};
