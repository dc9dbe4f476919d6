//! Content records

use serde::{Deserialize, Serialize};

use super::{is_zero, ActorId, ContentId};

/// Lifecycle status of a content item, owned by the external store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

/// An authored content item with its denormalized engagement counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    #[serde(rename = "authorId")]
    pub author_id: ActorId,
    #[serde(rename = "likesCount", default, skip_serializing_if = "is_zero")]
    pub likes_count: u64,
    #[serde(rename = "bookmarksCount", default, skip_serializing_if = "is_zero")]
    pub bookmarks_count: u64,
    #[serde(rename = "commentsCount", default, skip_serializing_if = "is_zero")]
    pub comments_count: u64,
    #[serde(default)]
    pub status: ContentStatus,
}

impl Content {
    /// Create a published content item with zeroed counters
    pub fn new(id: impl Into<ContentId>, author_id: impl Into<ActorId>) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            likes_count: 0,
            bookmarks_count: 0,
            comments_count: 0,
            status: ContentStatus::Published,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_deserializes_with_missing_counters() {
        let json = r#"{"id":"C1","authorId":"alice"}"#;
        let content: Content = serde_json::from_str(json).unwrap();
        assert_eq!(content, Content::new("C1", "alice"));
    }
}
