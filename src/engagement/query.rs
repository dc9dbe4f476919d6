//! Snapshot queries used by clients to refetch a topic

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::types::{ActorId, Comment, CommentId, Content, ContentId, Subject};

use super::EngagementLedger;

/// Full state of a content topic
///
/// `as_of` is the last event id allocated before the snapshot was read.
/// Every event up to it is already reflected in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    #[serde(rename = "asOf", default)]
    pub as_of: u64,
    pub content: Content,
    /// Top-level comments, newest first
    pub comments: Vec<Comment>,
    #[serde(rename = "isLiked", default)]
    pub is_liked: bool,
    #[serde(rename = "isBookmarked", default)]
    pub is_bookmarked: bool,
    /// Comments in this snapshot the viewer has liked
    #[serde(rename = "likedCommentIds", default)]
    pub liked_comment_ids: Vec<CommentId>,
}

/// Full state of a reply thread topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    #[serde(rename = "asOf", default)]
    pub as_of: u64,
    pub parent: Comment,
    /// Replies, oldest first
    pub replies: Vec<Comment>,
    #[serde(rename = "likedCommentIds", default)]
    pub liked_comment_ids: Vec<CommentId>,
}

fn liked_by_viewer<'a>(
    ledger: &EngagementLedger,
    comments: impl IntoIterator<Item = &'a Comment>,
    viewer: Option<&ActorId>,
) -> Vec<CommentId> {
    let Some(viewer) = viewer else {
        return Vec::new();
    };
    comments
        .into_iter()
        .filter(|c| ledger.counters.is_liked(&Subject::Comment(c.id.clone()), viewer))
        .map(|c| c.id.clone())
        .collect()
}

pub fn content_snapshot(
    ledger: &EngagementLedger,
    id: &ContentId,
    viewer: Option<&ActorId>,
) -> SyncResult<ContentSnapshot> {
    let as_of = ledger.clock.current();
    let state = ledger.state.read();
    let entry = state.content_entry(id)?;

    let comments: Vec<Comment> = entry
        .comment_ids
        .iter()
        .rev()
        .filter_map(|cid| state.comments.get(cid))
        .map(|c| ledger.hydrate_comment(&c.comment))
        .collect();

    let subject = Subject::Content(id.clone());
    let (is_liked, is_bookmarked) = match viewer {
        Some(v) => (
            ledger.counters.is_liked(&subject, v),
            ledger.counters.is_bookmarked(id, v),
        ),
        None => (false, false),
    };

    Ok(ContentSnapshot {
        as_of,
        content: ledger.hydrate_content(&entry.content),
        liked_comment_ids: liked_by_viewer(ledger, &comments, viewer),
        comments,
        is_liked,
        is_bookmarked,
    })
}

pub fn thread_snapshot(
    ledger: &EngagementLedger,
    id: &CommentId,
    viewer: Option<&ActorId>,
) -> SyncResult<ThreadSnapshot> {
    let as_of = ledger.clock.current();
    let state = ledger.state.read();
    let entry = state.comment_entry(id)?;
    if let Some(parent) = &entry.comment.parent_comment_id {
        // Threads are only opened on top-level comments
        return Err(SyncError::NestedReply(parent.clone()));
    }

    let parent = ledger.hydrate_comment(&entry.comment);
    let replies: Vec<Comment> = entry
        .reply_ids
        .iter()
        .filter_map(|rid| state.comments.get(rid))
        .map(|r| ledger.hydrate_comment(&r.comment))
        .collect();

    let liked_comment_ids =
        liked_by_viewer(ledger, std::iter::once(&parent).chain(replies.iter()), viewer);

    Ok(ThreadSnapshot {
        as_of,
        parent,
        replies,
        liked_comment_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewComment;

    #[test]
    fn test_content_snapshot_orders_newest_first() {
        let ledger = EngagementLedger::new();
        ledger.track_content(Content::new("C1", "author"));
        for id in ["K1", "K2", "K3"] {
            ledger
                .record_comment(NewComment::top_level(id, "C1", "a", "x"))
                .unwrap();
        }
        ledger
            .record_comment(NewComment::reply("R1", "C1", "K1", "b", "y"))
            .unwrap();
        let viewer = ActorId::new("v");
        ledger
            .toggle_like(&Subject::Comment(CommentId::new("K2")), &viewer, None)
            .unwrap();

        let snapshot = ledger
            .content_snapshot(&ContentId::new("C1"), Some(&viewer))
            .unwrap();
        let ids: Vec<&str> = snapshot.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["K3", "K2", "K1"]);
        assert_eq!(snapshot.content.comments_count, 4);
        assert_eq!(snapshot.liked_comment_ids, vec![CommentId::new("K2")]);
        assert!(!snapshot.is_liked);
        // three comments, one reply, one like
        assert_eq!(snapshot.as_of, 5);
    }

    #[test]
    fn test_thread_snapshot_lists_replies_oldest_first() {
        let ledger = EngagementLedger::new();
        ledger.track_content(Content::new("C1", "author"));
        ledger
            .record_comment(NewComment::top_level("K1", "C1", "a", "x"))
            .unwrap();
        for id in ["R1", "R2"] {
            ledger
                .record_comment(NewComment::reply(id, "C1", "K1", "b", "y"))
                .unwrap();
        }

        let snapshot = ledger.thread_snapshot(&CommentId::new("K1"), None).unwrap();
        assert_eq!(snapshot.parent.replies_count, 2);
        let ids: Vec<&str> = snapshot.replies.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R2"]);

        let err = ledger.thread_snapshot(&CommentId::new("R1"), None).unwrap_err();
        assert_eq!(err.code(), "NESTED_REPLY");
    }
}
