//! Tag model
//!
//! Tags are free-form labels attached to media items through the
//! `MediaItemTags` join table.

use serde::{Deserialize, Serialize};

/// Tag entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Unique identifier, generated by the database
    pub tag_id: i64,
    /// Tag name, unique across all tags
    pub tag_name: String,
}

/// Association row between a media item and a tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaItemTag {
    pub media_id: i64,
    pub tag_id: i64,
}

/// A tag reported in the context of one media item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagResult {
    pub tag_id: i64,
    pub tag_name: String,
    pub media_id: i64,
}

/// Input for creating a tag, optionally attached to a media item in the same step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTagInput {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tag_input_media_id_optional() {
        let input: CreateTagInput = serde_json::from_str(r#"{"tag_name":"beach"}"#).unwrap();
        assert_eq!(input.media_id, None);

        let input: CreateTagInput =
            serde_json::from_str(r#"{"tag_name":"beach","media_id":12}"#).unwrap();
        assert_eq!(input.media_id, Some(12));
    }
}
