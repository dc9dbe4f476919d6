//! Optimistic local mutations

use crate::types::{Comment, CommentId, ContentId};

/// A change the local actor made before the server confirmed it.
///
/// Optimistic changes never claim a counter version, so the first
/// authoritative event touching the same counter overwrites them.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimisticMutation {
    ToggleContentLike { content_id: ContentId },
    ToggleBookmark { content_id: ContentId },
    ToggleCommentLike { comment_id: CommentId },
    /// A comment or reply the local actor just posted
    InsertComment(Comment),
}
