//! Engagement ledger - authoritative in-process view of engagement state
//!
//! The external store owns durable content and comments. The ledger mirrors
//! what it has been told about (content items, live comments, tombstones) so
//! the realtime layer can resolve topics, cascade deletions and hand out
//! authoritative counters.
//!
//! Structural changes (comment creation, cascading deletion) take the write
//! lock; counter toggles take the read lock plus a per-subject mutex inside
//! [`CounterGuard`], so a toggle never races a deletion of its subject.

mod clock;
mod comments;
mod counters;
mod deletion;
mod query;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{Outcome, SyncError, SyncResult};
use crate::types::{ActorId, Comment, CommentId, Content, ContentId, NewComment, Subject};

pub use clock::EventClock;
pub use comments::CommentRecorded;
pub use counters::{BookmarkState, CounterGuard, LikeState, Toggled};
pub use deletion::DeletionResult;
pub use query::{ContentSnapshot, ThreadSnapshot};

pub(crate) struct ContentEntry {
    pub(crate) content: Content,
    /// Top-level comments in creation order
    pub(crate) comment_ids: Vec<CommentId>,
}

pub(crate) struct CommentEntry {
    pub(crate) comment: Comment,
    /// Replies in creation order (empty for replies)
    pub(crate) reply_ids: Vec<CommentId>,
}

#[derive(Default)]
pub(crate) struct LedgerState {
    pub(crate) contents: HashMap<ContentId, ContentEntry>,
    pub(crate) comments: HashMap<CommentId, CommentEntry>,
    /// Deleted comment -> owning content
    pub(crate) tombstones: HashMap<CommentId, ContentId>,
}

impl LedgerState {
    pub(crate) fn content_entry(&self, id: &ContentId) -> SyncResult<&ContentEntry> {
        self.contents
            .get(id)
            .ok_or_else(|| SyncError::content_not_found(id))
    }

    pub(crate) fn comment_entry(&self, id: &CommentId) -> SyncResult<&CommentEntry> {
        self.comments
            .get(id)
            .ok_or_else(|| SyncError::comment_not_found(id))
    }
}

/// What a like toggle landed on, with what topic targeting needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeTarget {
    Content(ContentId),
    Comment {
        comment_id: CommentId,
        content_id: ContentId,
        parent_comment_id: Option<CommentId>,
    },
}

/// Result of a like toggle on any subject
#[derive(Debug, Clone)]
pub struct LikeToggled {
    pub state: LikeState,
    pub outcome: Outcome,
    pub target: LikeTarget,
    pub event_id: Option<u64>,
}

/// Ledger statistics for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub contents: usize,
    pub comments: usize,
    pub tombstones: usize,
    #[serde(rename = "counterSubjects")]
    pub counter_subjects: usize,
}

/// Authoritative engagement state shared by the service and the API
pub struct EngagementLedger {
    pub(crate) state: RwLock<LedgerState>,
    pub(crate) counters: CounterGuard,
    pub(crate) clock: Arc<EventClock>,
}

impl Default for EngagementLedger {
    fn default() -> Self {
        Self::with_clock(Arc::new(EventClock::new()))
    }
}

impl EngagementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger stamping events from a shared clock
    pub fn with_clock(clock: Arc<EventClock>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            counters: CounterGuard::with_clock(Arc::clone(&clock)),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<EventClock> {
        &self.clock
    }

    /// Start tracking a content item. Re-tracking keeps the existing
    /// counters and only refreshes author and status.
    pub fn track_content(&self, content: Content) -> Outcome {
        let mut state = self.state.write();
        match state.contents.get_mut(&content.id) {
            Some(entry) => {
                entry.content.author_id = content.author_id;
                entry.content.status = content.status;
                Outcome::AlreadyProcessed
            }
            None => {
                let id = content.id.clone();
                let content = Content {
                    likes_count: 0,
                    bookmarks_count: 0,
                    comments_count: 0,
                    ..content
                };
                state.contents.insert(
                    id,
                    ContentEntry {
                        content,
                        comment_ids: Vec::new(),
                    },
                );
                Outcome::Applied
            }
        }
    }

    /// Current content record with authoritative counters
    pub fn content(&self, id: &ContentId) -> SyncResult<Content> {
        let state = self.state.read();
        let entry = state.content_entry(id)?;
        Ok(self.hydrate_content(&entry.content))
    }

    /// Current comment record with authoritative counters
    pub fn comment(&self, id: &CommentId) -> SyncResult<Comment> {
        let state = self.state.read();
        let entry = state.comment_entry(id)?;
        Ok(self.hydrate_comment(&entry.comment))
    }

    /// Whether `id` names a comment that was deleted
    pub fn is_deleted(&self, id: &CommentId) -> bool {
        self.state.read().tombstones.contains_key(id)
    }

    pub(crate) fn hydrate_content(&self, content: &Content) -> Content {
        Content {
            likes_count: self.counters.likes_count(&Subject::Content(content.id.clone())),
            bookmarks_count: self.counters.bookmarks_count(&content.id),
            ..content.clone()
        }
    }

    pub(crate) fn hydrate_comment(&self, comment: &Comment) -> Comment {
        Comment {
            likes_count: self.counters.likes_count(&Subject::Comment(comment.id.clone())),
            ..comment.clone()
        }
    }

    /// Record a persisted comment or reply
    pub fn record_comment(&self, new_comment: NewComment) -> SyncResult<CommentRecorded> {
        comments::record_comment(self, new_comment)
    }

    /// Delete a comment together with its replies
    pub fn delete_comment(&self, id: &CommentId) -> SyncResult<DeletionResult> {
        deletion::delete_comment(self, id)
    }

    /// Flip a like. `desired` turns the toggle into an idempotent assignment.
    pub fn toggle_like(
        &self,
        subject: &Subject,
        actor: &ActorId,
        desired: Option<bool>,
    ) -> SyncResult<LikeToggled> {
        // Held across the toggle so a concurrent cascade cannot interleave
        let ledger = self.state.read();
        let target = match subject {
            Subject::Content(id) => {
                ledger.content_entry(id)?;
                LikeTarget::Content(id.clone())
            }
            Subject::Comment(id) => {
                let entry = ledger.comment_entry(id)?;
                LikeTarget::Comment {
                    comment_id: id.clone(),
                    content_id: entry.comment.content_id.clone(),
                    parent_comment_id: entry.comment.parent_comment_id.clone(),
                }
            }
        };

        let toggled = match desired {
            Some(liked) => self.counters.set_like(subject, actor, liked),
            None => self.counters.toggle_like(subject, actor),
        };
        Ok(LikeToggled {
            state: toggled.state,
            outcome: toggled.outcome,
            target,
            event_id: toggled.event_id,
        })
    }

    /// Flip a bookmark. `desired` turns the toggle into an idempotent assignment.
    pub fn toggle_bookmark(
        &self,
        content: &ContentId,
        actor: &ActorId,
        desired: Option<bool>,
    ) -> SyncResult<Toggled<BookmarkState>> {
        let ledger = self.state.read();
        ledger.content_entry(content)?;
        Ok(match desired {
            Some(bookmarked) => self.counters.set_bookmark(content, actor, bookmarked),
            None => self.counters.toggle_bookmark(content, actor),
        })
    }

    /// Snapshot of a content topic for a full refetch
    pub fn content_snapshot(
        &self,
        id: &ContentId,
        viewer: Option<&ActorId>,
    ) -> SyncResult<ContentSnapshot> {
        query::content_snapshot(self, id, viewer)
    }

    /// Snapshot of a reply thread for a full refetch
    pub fn thread_snapshot(
        &self,
        id: &CommentId,
        viewer: Option<&ActorId>,
    ) -> SyncResult<ThreadSnapshot> {
        query::thread_snapshot(self, id, viewer)
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.state.read();
        LedgerStats {
            contents: state.contents.len(),
            comments: state.comments.len(),
            tombstones: state.tombstones.len(),
            counter_subjects: self.counters.tracked_subjects(),
        }
    }

    pub fn counters(&self) -> &CounterGuard {
        &self.counters
    }
}
