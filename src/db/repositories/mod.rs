//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod tag;

pub use tag::{AttachOutcome, SqlxTagRepository, TagRepository};
