//! Inbound mutation handling
//!
//! The persistence layer calls into [`EngagementService`] after a mutation
//! is durably committed. Each call updates the ledger (which owns the
//! authoritative counters), turns the result into exactly one
//! [`SyncEvent`] and dispatches it. Mutations that turn out to be no-ops
//! (`AlreadyProcessed`) are not broadcast.

use std::sync::Arc;

use serde::Serialize;

use crate::engagement::{
    BookmarkState, DeletionResult, EngagementLedger, EventClock, LikeState, LikeTarget,
};
use crate::error::{Outcome, SyncResult};
use crate::realtime::broadcaster::EventBroadcaster;
use crate::realtime::events::{
    BookmarkUpdated, CommentCreated, CommentDeleted, CommentLikeUpdated, LikeUpdated,
    ReplyCreated, SyncEvent,
};
use crate::realtime::registry::SubscriptionRegistry;
use crate::types::{ActorId, Comment, CommentId, Content, ContentId, NewComment, Subject};

/// Response returned to the persistence layer for any notification
#[derive(Debug, Clone, Serialize)]
pub struct Notified<T> {
    #[serde(flatten)]
    pub result: T,
    pub outcome: Outcome,
    /// Id of the broadcast event, absent when nothing was broadcast
    #[serde(rename = "eventId", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<u64>,
}

pub struct EngagementService {
    ledger: Arc<EngagementLedger>,
    broadcaster: Arc<EventBroadcaster>,
}

impl EngagementService {
    pub fn new(ledger: Arc<EngagementLedger>, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            ledger,
            broadcaster,
        }
    }

    /// Wire a fresh ledger, registry and broadcaster around one clock
    pub fn standalone() -> Self {
        let clock = Arc::new(EventClock::new());
        let registry = SubscriptionRegistry::new();
        Self::new(
            Arc::new(EngagementLedger::with_clock(Arc::clone(&clock))),
            Arc::new(EventBroadcaster::new(registry, clock)),
        )
    }

    pub fn ledger(&self) -> &Arc<EngagementLedger> {
        &self.ledger
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.broadcaster.registry()
    }

    /// Dispatch under the id the ledger stamped; no id means nothing changed
    fn broadcast_if(
        &self,
        event_id: Option<u64>,
        event: impl FnOnce() -> SyncEvent,
    ) -> Option<u64> {
        let event_id = event_id?;
        Some(self.broadcaster.dispatch_stamped(event_id, event()).event_id)
    }

    /// Make a content item known to the realtime layer
    pub fn track_content(&self, content: Content) -> Outcome {
        let id = content.id.clone();
        let outcome = self.ledger.track_content(content);
        tracing::debug!(content = %id, ?outcome, "tracking content");
        outcome
    }

    /// A comment or reply was persisted
    pub fn notify_comment_created(&self, new_comment: NewComment) -> SyncResult<Notified<Comment>> {
        let recorded = self.ledger.record_comment(new_comment)?;

        let event_id = self.broadcast_if(recorded.event_id, || {
            match (&recorded.comment.parent_comment_id, recorded.parent_replies_count) {
                (Some(parent), Some(parent_replies_count)) => SyncEvent::ReplyCreated(ReplyCreated {
                    reply: recorded.comment.clone(),
                    parent_comment_id: parent.clone(),
                    comments_count: recorded.comments_count,
                    parent_replies_count,
                }),
                _ => SyncEvent::CommentCreated(CommentCreated {
                    comment: recorded.comment.clone(),
                    comments_count: recorded.comments_count,
                }),
            }
        });

        Ok(Notified {
            result: recorded.comment,
            outcome: recorded.outcome,
            event_id,
        })
    }

    /// A like on content or on a comment was toggled. With `desired` set the
    /// notification is an idempotent assignment instead of a flip.
    pub fn notify_like_toggled(
        &self,
        subject: Subject,
        actor: ActorId,
        desired: Option<bool>,
    ) -> SyncResult<Notified<LikeState>> {
        let toggled = self.ledger.toggle_like(&subject, &actor, desired)?;
        let state = toggled.state;

        let event_id = self.broadcast_if(toggled.event_id, || match toggled.target {
            LikeTarget::Content(content_id) => SyncEvent::LikeUpdated(LikeUpdated {
                content_id,
                likes_count: state.likes_count,
                actor_id: actor,
                is_liked: state.is_liked,
            }),
            LikeTarget::Comment {
                comment_id,
                content_id,
                parent_comment_id,
            } => SyncEvent::CommentLikeUpdated(CommentLikeUpdated {
                comment_id,
                content_id,
                parent_comment_id,
                likes_count: state.likes_count,
                actor_id: actor,
                is_liked: state.is_liked,
            }),
        });

        Ok(Notified {
            result: state,
            outcome: toggled.outcome,
            event_id,
        })
    }

    /// A bookmark was toggled. With `desired` set the notification is an
    /// idempotent assignment instead of a flip.
    pub fn notify_bookmark_toggled(
        &self,
        content_id: ContentId,
        actor: ActorId,
        desired: Option<bool>,
    ) -> SyncResult<Notified<BookmarkState>> {
        let toggled = self.ledger.toggle_bookmark(&content_id, &actor, desired)?;
        let state = toggled.state;

        let event_id = self.broadcast_if(toggled.event_id, || {
            SyncEvent::BookmarkUpdated(BookmarkUpdated {
                content_id,
                bookmarks_count: state.bookmarks_count,
                actor_id: actor,
                is_bookmarked: state.is_bookmarked,
            })
        });

        Ok(Notified {
            result: state,
            outcome: toggled.outcome,
            event_id,
        })
    }

    /// A comment was deleted; its replies go with it
    pub fn notify_comment_deleted(
        &self,
        comment_id: CommentId,
    ) -> SyncResult<Notified<DeletionResult>> {
        let result = self.ledger.delete_comment(&comment_id)?;
        let outcome = result.outcome();

        let event_id = self.broadcast_if(result.event_id, || {
            SyncEvent::CommentDeleted(CommentDeleted {
                comment_id: comment_id.clone(),
                parent_comment_id: result.parent_comment_id.clone(),
                content_id: result.content_id.clone(),
                deleted_ids: result.deleted_ids.clone(),
                comments_count: result.comments_count,
                parent_replies_count: result.parent_replies_count,
            })
        });

        Ok(Notified {
            result,
            outcome,
            event_id,
        })
    }
}
