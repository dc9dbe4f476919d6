//! Error types for the engagement sync server

use serde::Serialize;
use thiserror::Error;

use crate::types::{CommentId, ConnectionId};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("parent comment {0} has been deleted")]
    ParentDeleted(CommentId),

    #[error("comment {0} is a reply and cannot be replied to")]
    NestedReply(CommentId),

    #[error("comment {comment} does not belong to content {content}")]
    ContentMismatch { comment: CommentId, content: String },

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("delivery to {0} failed: connection closed")]
    DeliveryFailure(ConnectionId),

    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("reply body is empty")]
    EmptyReply,

    #[error("a reply to {0} is already being submitted")]
    ReplyInFlight(CommentId),

    #[error("snapshot for {topic} belongs to epoch {epoch} and was discarded")]
    StaleSnapshot { topic: String, epoch: u64 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn content_not_found(id: impl ToString) -> Self {
        SyncError::NotFound {
            kind: "content",
            id: id.to_string(),
        }
    }

    pub fn comment_not_found(id: impl ToString) -> Self {
        SyncError::NotFound {
            kind: "comment",
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code used in API and socket error frames
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::NotFound { .. } => "NOT_FOUND",
            SyncError::ParentDeleted(_) => "PARENT_DELETED",
            SyncError::NestedReply(_) => "NESTED_REPLY",
            SyncError::ContentMismatch { .. } => "CONTENT_MISMATCH",
            SyncError::InvalidTopic(_) => "INVALID_TOPIC",
            SyncError::DeliveryFailure(_) => "DELIVERY_FAILURE",
            SyncError::UnknownConnection(_) => "UNKNOWN_CONNECTION",
            SyncError::EmptyReply => "EMPTY_REPLY",
            SyncError::ReplyInFlight(_) => "REPLY_IN_FLIGHT",
            SyncError::StaleSnapshot { .. } => "STALE_SNAPSHOT",
            SyncError::Config(_) => "CONFIG",
        }
    }
}

/// Result of an operation that may find its target state already in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    AlreadyProcessed,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Outcome::Applied)
    }
}
