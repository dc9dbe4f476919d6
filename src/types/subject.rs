//! Like subjects

use serde::{Deserialize, Serialize};

use super::{CommentId, ContentId};

/// Kind of thing a like can target, as sent by the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Content,
    Comment,
}

/// A likeable subject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Content(ContentId),
    Comment(CommentId),
}

impl Subject {
    /// Build a subject from the loosely typed inbound pair
    pub fn from_parts(subject_type: SubjectType, id: impl Into<String>) -> Self {
        match subject_type {
            SubjectType::Content => Subject::Content(ContentId::new(id)),
            SubjectType::Comment => Subject::Comment(CommentId::new(id)),
        }
    }

    pub fn subject_type(&self) -> SubjectType {
        match self {
            Subject::Content(_) => SubjectType::Content,
            Subject::Comment(_) => SubjectType::Comment,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Subject::Content(id) => id.as_str(),
            Subject::Comment(id) => id.as_str(),
        }
    }
}
