//! Data types for the engagement sync server
//!
//! This module contains the identifiers, records and routing keys shared by
//! the ledger, the realtime layer and the client cache.

mod comment;
mod content;
mod ids;
mod subject;
mod topic;

pub use comment::{Comment, NewComment};
pub use content::{Content, ContentStatus};
pub use ids::{ActorId, CommentId, ConnectionId, ContentId};
pub use subject::{Subject, SubjectType};
pub use topic::Topic;

/// Check if value is zero (for skip_serializing_if)
pub fn is_zero(val: &u64) -> bool {
    *val == 0
}
