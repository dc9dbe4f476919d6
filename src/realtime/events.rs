//! Realtime event and frame types
//!
//! Every mutation the server fans out is one variant of [`SyncEvent`] with a
//! fixed payload struct. Topic targeting lives in [`SyncEvent::topics`] so
//! adding a variant forces the routing decision at compile time.

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, Comment, CommentId, ConnectionId, ContentId, Topic};

/// A top-level comment was created
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    pub comment: Comment,
    pub comments_count: u64,
}

/// A reply was created under a top-level comment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyCreated {
    pub reply: Comment,
    pub parent_comment_id: CommentId,
    pub comments_count: u64,
    pub parent_replies_count: u64,
}

/// A content like was toggled
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeUpdated {
    pub content_id: ContentId,
    pub likes_count: u64,
    pub actor_id: ActorId,
    pub is_liked: bool,
}

/// A content bookmark was toggled
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkUpdated {
    pub content_id: ContentId,
    pub bookmarks_count: u64,
    pub actor_id: ActorId,
    pub is_bookmarked: bool,
}

/// A comment or reply like was toggled
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLikeUpdated {
    pub comment_id: CommentId,
    pub content_id: ContentId,
    pub parent_comment_id: Option<CommentId>,
    pub likes_count: u64,
    pub actor_id: ActorId,
    pub is_liked: bool,
}

/// A comment was deleted along with its replies
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeleted {
    pub comment_id: CommentId,
    pub parent_comment_id: Option<CommentId>,
    pub content_id: ContentId,
    /// The requested id followed by every removed reply
    pub deleted_ids: Vec<CommentId>,
    pub comments_count: u64,
    pub parent_replies_count: Option<u64>,
}

/// Events fanned out to subscribed connections
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SyncEvent {
    #[serde(rename = "comment.created")]
    CommentCreated(CommentCreated),

    #[serde(rename = "reply.created")]
    ReplyCreated(ReplyCreated),

    #[serde(rename = "like.updated")]
    LikeUpdated(LikeUpdated),

    #[serde(rename = "bookmark.updated")]
    BookmarkUpdated(BookmarkUpdated),

    #[serde(rename = "comment.like.updated")]
    CommentLikeUpdated(CommentLikeUpdated),

    #[serde(rename = "comment.deleted")]
    CommentDeleted(CommentDeleted),
}

impl SyncEvent {
    /// Every topic this event must be delivered to
    pub fn topics(&self) -> Vec<Topic> {
        match self {
            SyncEvent::CommentCreated(e) => vec![Topic::Content(e.comment.content_id.clone())],
            SyncEvent::ReplyCreated(e) => vec![
                Topic::Content(e.reply.content_id.clone()),
                Topic::CommentThread(e.parent_comment_id.clone()),
            ],
            SyncEvent::LikeUpdated(e) => vec![Topic::Content(e.content_id.clone())],
            SyncEvent::BookmarkUpdated(e) => vec![Topic::Content(e.content_id.clone())],
            SyncEvent::CommentLikeUpdated(e) => {
                // The thread showing the comment: its parent's, or its own
                let thread = e.parent_comment_id.as_ref().unwrap_or(&e.comment_id);
                vec![
                    Topic::Content(e.content_id.clone()),
                    Topic::CommentThread(thread.clone()),
                ]
            }
            SyncEvent::CommentDeleted(e) => {
                let mut topics = vec![
                    Topic::Content(e.content_id.clone()),
                    Topic::CommentThread(e.comment_id.clone()),
                ];
                // Readers of the parent thread must drop the reply too
                if let Some(parent) = &e.parent_comment_id {
                    topics.push(Topic::CommentThread(parent.clone()));
                }
                topics
            }
        }
    }

    /// Content item the event belongs to
    pub fn content_id(&self) -> &ContentId {
        match self {
            SyncEvent::CommentCreated(e) => &e.comment.content_id,
            SyncEvent::ReplyCreated(e) => &e.reply.content_id,
            SyncEvent::LikeUpdated(e) => &e.content_id,
            SyncEvent::BookmarkUpdated(e) => &e.content_id,
            SyncEvent::CommentLikeUpdated(e) => &e.content_id,
            SyncEvent::CommentDeleted(e) => &e.content_id,
        }
    }

    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::CommentCreated(_) => "comment.created",
            SyncEvent::ReplyCreated(_) => "reply.created",
            SyncEvent::LikeUpdated(_) => "like.updated",
            SyncEvent::BookmarkUpdated(_) => "bookmark.updated",
            SyncEvent::CommentLikeUpdated(_) => "comment.like.updated",
            SyncEvent::CommentDeleted(_) => "comment.deleted",
        }
    }
}

/// Immutable event shared by every delivery of one mutation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Process-unique id, used by clients to drop duplicate deliveries
    pub event_id: u64,
    /// Unix timestamp (milliseconds) when the event was issued
    pub timestamp: i64,
    pub event: SyncEvent,
}

/// An event as it arrives at a client, tagged with the topic it came through
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveredEvent {
    pub topic: Topic,
    #[serde(flatten)]
    pub envelope: EventEnvelope,
}

/// Client -> server frames
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { topic: Topic },
    Unsubscribe { topic: Topic },
    Ping,
}

/// Error code of the frame sent after dropped deliveries
pub const LAGGED_CODE: &str = "lagged";

/// Server -> client frames
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connection
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
    },
    Subscribed {
        topic: Topic,
    },
    Unsubscribed {
        topic: Topic,
    },
    Pong,
    Error {
        code: String,
        message: String,
    },
    Event(DeliveredEvent),
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Frame telling the client it missed events and must refetch
    pub fn lagged() -> Self {
        Self::error(LAGGED_CODE, "Missed events, please refetch")
    }

    pub fn is_lagged(&self) -> bool {
        matches!(self, ServerMessage::Error { code, .. } if code == LAGGED_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reply() -> Comment {
        Comment {
            id: CommentId::new("R1"),
            content_id: ContentId::new("C1"),
            parent_comment_id: Some(CommentId::new("K1")),
            author_id: ActorId::new("bob"),
            body: "re".to_string(),
            likes_count: 0,
            replies_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reply_created_targets_content_and_thread() {
        let event = SyncEvent::ReplyCreated(ReplyCreated {
            reply: reply(),
            parent_comment_id: CommentId::new("K1"),
            comments_count: 2,
            parent_replies_count: 1,
        });
        assert_eq!(
            event.topics(),
            vec![Topic::content("C1"), Topic::thread("K1")]
        );
    }

    #[test]
    fn test_comment_like_on_top_level_targets_its_own_thread() {
        let event = SyncEvent::CommentLikeUpdated(CommentLikeUpdated {
            comment_id: CommentId::new("K1"),
            content_id: ContentId::new("C1"),
            parent_comment_id: None,
            likes_count: 1,
            actor_id: ActorId::new("a"),
            is_liked: true,
        });
        assert_eq!(
            event.topics(),
            vec![Topic::content("C1"), Topic::thread("K1")]
        );
    }

    #[test]
    fn test_deletion_targets_deleted_thread_directly() {
        let event = SyncEvent::CommentDeleted(CommentDeleted {
            comment_id: CommentId::new("K1"),
            parent_comment_id: None,
            content_id: ContentId::new("C1"),
            deleted_ids: vec![CommentId::new("K1"), CommentId::new("R1")],
            comments_count: 0,
            parent_replies_count: None,
        });
        assert_eq!(
            event.topics(),
            vec![Topic::content("C1"), Topic::thread("K1")]
        );
    }

    #[test]
    fn test_event_frame_serialization() {
        let frame = ServerMessage::Event(DeliveredEvent {
            topic: Topic::content("C1"),
            envelope: EventEnvelope {
                event_id: 7,
                timestamp: 1_700_000_000_000,
                event: SyncEvent::LikeUpdated(LikeUpdated {
                    content_id: ContentId::new("C1"),
                    likes_count: 3,
                    actor_id: ActorId::new("a"),
                    is_liked: true,
                }),
            },
        });

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"event\""));
        assert!(json.contains("\"topic\":\"content:C1\""));
        assert!(json.contains("\"kind\":\"like.updated\""));
        assert!(json.contains("\"likesCount\":3"));

        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","topic":"comment:K1"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { topic } if topic == Topic::thread("K1")));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe","topic":"x:1"}"#).is_err());
    }
}
