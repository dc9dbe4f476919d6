//! Comment and reply records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{is_zero, ActorId, CommentId, ContentId};

/// A comment on a content item. `parent_comment_id` is `None` for a
/// top-level comment and names a top-level comment for a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    #[serde(rename = "contentId")]
    pub content_id: ContentId,
    #[serde(rename = "parentCommentId", default)]
    pub parent_comment_id: Option<CommentId>,
    #[serde(rename = "authorId")]
    pub author_id: ActorId,
    pub body: String,
    #[serde(rename = "likesCount", default, skip_serializing_if = "is_zero")]
    pub likes_count: u64,
    /// Only meaningful for top-level comments
    #[serde(rename = "repliesCount", default, skip_serializing_if = "is_zero")]
    pub replies_count: u64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }
}

/// A freshly persisted comment handed over by the external store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub id: CommentId,
    #[serde(rename = "contentId")]
    pub content_id: ContentId,
    #[serde(rename = "parentCommentId", default)]
    pub parent_comment_id: Option<CommentId>,
    #[serde(rename = "authorId")]
    pub author_id: ActorId,
    pub body: String,
    #[serde(rename = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl NewComment {
    /// A top-level comment created now
    pub fn top_level(
        id: impl Into<CommentId>,
        content_id: impl Into<ContentId>,
        author_id: impl Into<ActorId>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content_id: content_id.into(),
            parent_comment_id: None,
            author_id: author_id.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// A reply to `parent` created now
    pub fn reply(
        id: impl Into<CommentId>,
        content_id: impl Into<ContentId>,
        parent: impl Into<CommentId>,
        author_id: impl Into<ActorId>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            parent_comment_id: Some(parent.into()),
            ..Self::top_level(id, content_id, author_id, body)
        }
    }

    pub(crate) fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            content_id: self.content_id,
            parent_comment_id: self.parent_comment_id,
            author_id: self.author_id,
            body: self.body,
            likes_count: 0,
            replies_count: 0,
            created_at: self.created_at,
        }
    }
}
