//! Data models
//!
//! Database entities and request payloads shared by the repository, service
//! and API layers.

mod tag;

pub use tag::{CreateTagInput, MediaItemTag, Tag, TagResult};
