//! Comment and reply recording

use crate::error::{Outcome, SyncError, SyncResult};
use crate::types::{Comment, NewComment};

use super::{CommentEntry, EngagementLedger};

/// Result of recording a comment, carrying the counters it changed
#[derive(Debug, Clone)]
pub struct CommentRecorded {
    pub comment: Comment,
    pub outcome: Outcome,
    /// Content `commentsCount` after the insert
    pub comments_count: u64,
    /// Parent `repliesCount` after the insert (replies only)
    pub parent_replies_count: Option<u64>,
    /// Allocated only when the comment was newly recorded
    pub event_id: Option<u64>,
}

/// Record a persisted comment (thread-safe: holds write lock during entire operation)
///
/// Replies must target a live top-level comment of the same content.
/// Re-delivery of an already known (or already deleted) comment id is
/// reported as `AlreadyProcessed` without touching any counter.
pub fn record_comment(
    ledger: &EngagementLedger,
    new_comment: NewComment,
) -> SyncResult<CommentRecorded> {
    let mut state = ledger.state.write();
    let content_count = state.content_entry(&new_comment.content_id)?.content.comments_count;

    if let Some(existing) = state.comments.get(&new_comment.id) {
        let parent_replies_count = existing
            .comment
            .parent_comment_id
            .as_ref()
            .and_then(|p| state.comments.get(p))
            .map(|p| p.comment.replies_count);
        return Ok(CommentRecorded {
            comment: ledger.hydrate_comment(&existing.comment),
            outcome: Outcome::AlreadyProcessed,
            comments_count: content_count,
            parent_replies_count,
            event_id: None,
        });
    }
    if state.tombstones.contains_key(&new_comment.id) {
        return Ok(CommentRecorded {
            comment: new_comment.into_comment(),
            outcome: Outcome::AlreadyProcessed,
            comments_count: content_count,
            parent_replies_count: None,
            event_id: None,
        });
    }

    if let Some(parent_id) = &new_comment.parent_comment_id {
        if state.tombstones.contains_key(parent_id) {
            return Err(SyncError::ParentDeleted(parent_id.clone()));
        }
        let parent = state.comment_entry(parent_id)?;
        if parent.comment.is_reply() {
            return Err(SyncError::NestedReply(parent_id.clone()));
        }
        if parent.comment.content_id != new_comment.content_id {
            return Err(SyncError::ContentMismatch {
                comment: parent_id.clone(),
                content: new_comment.content_id.to_string(),
            });
        }
    }

    let comment = new_comment.into_comment();
    let id = comment.id.clone();

    let parent_replies_count = match &comment.parent_comment_id {
        Some(parent_id) => {
            let parent = state
                .comments
                .get_mut(parent_id)
                .ok_or_else(|| SyncError::comment_not_found(parent_id))?;
            parent.reply_ids.push(id.clone());
            parent.comment.replies_count += 1;
            Some(parent.comment.replies_count)
        }
        None => None,
    };

    let content = state
        .contents
        .get_mut(&comment.content_id)
        .ok_or_else(|| SyncError::content_not_found(&comment.content_id))?;
    content.content.comments_count += 1;
    if !comment.is_reply() {
        content.comment_ids.push(id.clone());
    }
    let comments_count = content.content.comments_count;

    state.comments.insert(
        id,
        CommentEntry {
            comment: comment.clone(),
            reply_ids: Vec::new(),
        },
    );

    Ok(CommentRecorded {
        comment,
        outcome: Outcome::Applied,
        comments_count,
        parent_replies_count,
        event_id: Some(ledger.clock.tick()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommentId, Content, ContentId};

    fn ledger_with_content() -> EngagementLedger {
        let ledger = EngagementLedger::new();
        ledger.track_content(Content::new("C1", "author"));
        ledger
    }

    #[test]
    fn test_reply_updates_both_counters() {
        let ledger = ledger_with_content();
        let top = ledger
            .record_comment(NewComment::top_level("K1", "C1", "a", "first"))
            .unwrap();
        assert_eq!(top.comments_count, 1);
        assert_eq!(top.parent_replies_count, None);

        let reply = ledger
            .record_comment(NewComment::reply("R1", "C1", "K1", "b", "re"))
            .unwrap();
        assert_eq!(reply.outcome, Outcome::Applied);
        assert_eq!(reply.comments_count, 2);
        assert_eq!(reply.parent_replies_count, Some(1));
        assert_eq!(ledger.comment(&CommentId::new("K1")).unwrap().replies_count, 1);
    }

    #[test]
    fn test_reply_to_reply_is_rejected() {
        let ledger = ledger_with_content();
        ledger
            .record_comment(NewComment::top_level("K1", "C1", "a", "first"))
            .unwrap();
        ledger
            .record_comment(NewComment::reply("R1", "C1", "K1", "b", "re"))
            .unwrap();

        let err = ledger
            .record_comment(NewComment::reply("R2", "C1", "R1", "c", "re re"))
            .unwrap_err();
        assert_eq!(err, SyncError::NestedReply(CommentId::new("R1")));
        assert_eq!(ledger.content(&ContentId::new("C1")).unwrap().comments_count, 2);
    }

    #[test]
    fn test_duplicate_notification_is_already_processed() {
        let ledger = ledger_with_content();
        let new_comment = NewComment::top_level("K1", "C1", "a", "first");
        ledger.record_comment(new_comment.clone()).unwrap();

        let again = ledger.record_comment(new_comment).unwrap();
        assert_eq!(again.outcome, Outcome::AlreadyProcessed);
        assert_eq!(again.comments_count, 1);
        assert_eq!(again.event_id, None);
    }

    #[test]
    fn test_comment_on_unknown_content_is_not_found() {
        let ledger = EngagementLedger::new();
        let err = ledger
            .record_comment(NewComment::top_level("K1", "missing", "a", "x"))
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_reply_across_contents_is_rejected() {
        let ledger = ledger_with_content();
        ledger.track_content(Content::new("C2", "author"));
        ledger
            .record_comment(NewComment::top_level("K1", "C1", "a", "first"))
            .unwrap();

        let err = ledger
            .record_comment(NewComment::reply("R1", "C2", "K1", "b", "re"))
            .unwrap_err();
        assert!(matches!(err, SyncError::ContentMismatch { .. }));
    }
}
