//! Cascading comment deletion
//!
//! Replies are at most one level deep, so deleting a top-level comment
//! removes it and its direct replies, and deleting a reply removes only the
//! reply. Both happen under a single write lock.

use serde::Serialize;

use crate::error::{Outcome, SyncError, SyncResult};
use crate::types::{CommentId, ContentId};

use super::EngagementLedger;

/// Everything a subscriber needs to purge a deleted subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionResult {
    /// Requested id first, then every removed reply in creation order.
    /// Empty when the comment had already been deleted.
    #[serde(rename = "deletedIds")]
    pub deleted_ids: Vec<CommentId>,
    #[serde(rename = "parentCommentId")]
    pub parent_comment_id: Option<CommentId>,
    #[serde(rename = "contentId")]
    pub content_id: ContentId,
    /// Content `commentsCount` after the deletion
    #[serde(rename = "commentsCount")]
    pub comments_count: u64,
    /// Parent `repliesCount` after the deletion (replies only)
    #[serde(rename = "parentRepliesCount")]
    pub parent_replies_count: Option<u64>,
    #[serde(skip)]
    pub event_id: Option<u64>,
}

impl DeletionResult {
    pub fn outcome(&self) -> Outcome {
        if self.deleted_ids.is_empty() {
            Outcome::AlreadyProcessed
        } else {
            Outcome::Applied
        }
    }
}

/// Delete a comment and its replies (thread-safe: holds write lock during entire operation)
pub fn delete_comment(ledger: &EngagementLedger, id: &CommentId) -> SyncResult<DeletionResult> {
    let mut state = ledger.state.write();

    if let Some(content_id) = state.tombstones.get(id).cloned() {
        let comments_count = state.content_entry(&content_id)?.content.comments_count;
        return Ok(DeletionResult {
            deleted_ids: Vec::new(),
            parent_comment_id: None,
            content_id,
            comments_count,
            parent_replies_count: None,
            event_id: None,
        });
    }

    let entry = state
        .comments
        .remove(id)
        .ok_or_else(|| SyncError::comment_not_found(id))?;
    let content_id = entry.comment.content_id.clone();
    let parent_comment_id = entry.comment.parent_comment_id.clone();

    let mut deleted_ids = Vec::with_capacity(1 + entry.reply_ids.len());
    deleted_ids.push(id.clone());
    for reply_id in entry.reply_ids {
        if state.comments.remove(&reply_id).is_some() {
            deleted_ids.push(reply_id);
        }
    }

    let parent_replies_count = match &parent_comment_id {
        Some(parent_id) => state.comments.get_mut(parent_id).map(|parent| {
            parent.reply_ids.retain(|r| r != id);
            parent.comment.replies_count = parent.comment.replies_count.saturating_sub(1);
            parent.comment.replies_count
        }),
        None => None,
    };

    let removed = deleted_ids.len() as u64;
    let comments_count = match state.contents.get_mut(&content_id) {
        Some(content) => {
            content.comment_ids.retain(|c| c != id);
            content.content.comments_count = content.content.comments_count.saturating_sub(removed);
            content.content.comments_count
        }
        None => 0,
    };

    for deleted in &deleted_ids {
        state.tombstones.insert(deleted.clone(), content_id.clone());
    }
    ledger.counters.forget_comments(&deleted_ids);
    let event_id = ledger.clock.tick();

    tracing::debug!(
        comment = %id,
        removed = deleted_ids.len(),
        "resolved cascading deletion"
    );

    Ok(DeletionResult {
        deleted_ids,
        parent_comment_id,
        content_id,
        comments_count,
        parent_replies_count,
        event_id: Some(event_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActorId, Content, NewComment, Subject};

    fn seeded(replies: usize) -> EngagementLedger {
        let ledger = EngagementLedger::new();
        ledger.track_content(Content::new("C1", "author"));
        ledger
            .record_comment(NewComment::top_level("K1", "C1", "a", "top"))
            .unwrap();
        for i in 1..=replies {
            ledger
                .record_comment(NewComment::reply(format!("R{}", i), "C1", "K1", "b", "re"))
                .unwrap();
        }
        ledger
    }

    #[test]
    fn test_top_level_delete_cascades_to_replies() {
        let ledger = seeded(2);
        let content_id = ContentId::new("C1");
        assert_eq!(ledger.content(&content_id).unwrap().comments_count, 3);

        let result = ledger.delete_comment(&CommentId::new("K1")).unwrap();
        assert_eq!(
            result.deleted_ids,
            vec![CommentId::new("K1"), CommentId::new("R1"), CommentId::new("R2")]
        );
        assert_eq!(result.parent_comment_id, None);
        assert_eq!(result.comments_count, 0);
        assert_eq!(ledger.content(&content_id).unwrap().comments_count, 0);
        assert!(ledger.is_deleted(&CommentId::new("R2")));
    }

    #[test]
    fn test_cascade_size_is_replies_plus_one() {
        for n in [0usize, 1, 5] {
            let ledger = seeded(n);
            let before = ledger.content(&ContentId::new("C1")).unwrap().comments_count;
            let result = ledger.delete_comment(&CommentId::new("K1")).unwrap();
            assert_eq!(result.deleted_ids.len(), n + 1);
            assert_eq!(before - result.comments_count, (n + 1) as u64);
        }
    }

    #[test]
    fn test_reply_delete_only_removes_reply() {
        let ledger = seeded(2);
        let result = ledger.delete_comment(&CommentId::new("R1")).unwrap();

        assert_eq!(result.deleted_ids, vec![CommentId::new("R1")]);
        assert_eq!(result.parent_comment_id, Some(CommentId::new("K1")));
        assert_eq!(result.parent_replies_count, Some(1));
        assert_eq!(result.comments_count, 2);
        assert_eq!(ledger.comment(&CommentId::new("K1")).unwrap().replies_count, 1);
    }

    #[test]
    fn test_repeat_delete_is_noop() {
        let ledger = seeded(1);
        ledger.delete_comment(&CommentId::new("K1")).unwrap();

        let again = ledger.delete_comment(&CommentId::new("K1")).unwrap();
        assert!(again.deleted_ids.is_empty());
        assert_eq!(again.outcome(), Outcome::AlreadyProcessed);

        // A reply swept by the cascade is also already deleted
        let reply = ledger.delete_comment(&CommentId::new("R1")).unwrap();
        assert!(reply.deleted_ids.is_empty());
    }

    #[test]
    fn test_unknown_comment_is_not_found() {
        let ledger = seeded(0);
        let err = ledger.delete_comment(&CommentId::new("ghost")).unwrap_err();
        assert!(matches!(err, SyncError::NotFound { kind: "comment", .. }));
    }

    #[test]
    fn test_deletion_drops_comment_likes() {
        let ledger = seeded(1);
        let reply = Subject::Comment(CommentId::new("R1"));
        ledger.toggle_like(&reply, &ActorId::new("x"), None).unwrap();

        ledger.delete_comment(&CommentId::new("K1")).unwrap();
        assert_eq!(ledger.counters().likes_count(&reply), 0);
    }

    #[test]
    fn test_reply_to_deleted_parent_is_rejected() {
        let ledger = seeded(0);
        ledger.delete_comment(&CommentId::new("K1")).unwrap();

        let err = ledger
            .record_comment(NewComment::reply("R9", "C1", "K1", "b", "late"))
            .unwrap_err();
        assert_eq!(err, SyncError::ParentDeleted(CommentId::new("K1")));
    }
}
