//! Topic routing keys
//!
//! A topic is either `content:<id>` (everything happening on a content item)
//! or `comment:<id>` (a single reply thread). Topics are never stored; they
//! live in the subscription registry only while someone subscribes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{CommentId, ContentId};
use crate::error::SyncError;

const CONTENT_PREFIX: &str = "content:";
const COMMENT_PREFIX: &str = "comment:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Content(ContentId),
    CommentThread(CommentId),
}

impl Topic {
    pub fn content(id: impl Into<ContentId>) -> Self {
        Topic::Content(id.into())
    }

    pub fn thread(id: impl Into<CommentId>) -> Self {
        Topic::CommentThread(id.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Content(id) => write!(f, "{}{}", CONTENT_PREFIX, id),
            Topic::CommentThread(id) => write!(f, "{}{}", COMMENT_PREFIX, id),
        }
    }
}

impl FromStr for Topic {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix(CONTENT_PREFIX) {
            if !id.is_empty() {
                return Ok(Topic::content(id));
            }
        } else if let Some(id) = s.strip_prefix(COMMENT_PREFIX) {
            if !id.is_empty() {
                return Ok(Topic::thread(id));
            }
        }
        Err(SyncError::InvalidTopic(s.to_string()))
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_display_and_parse() {
        let topic = Topic::content("C1");
        assert_eq!(topic.to_string(), "content:C1");
        assert_eq!("comment:K1".parse::<Topic>().unwrap(), Topic::thread("K1"));
    }

    #[test]
    fn test_topic_rejects_unknown_prefix() {
        assert!("user:42".parse::<Topic>().is_err());
        assert!("content:".parse::<Topic>().is_err());
    }

    #[test]
    fn test_topic_serde_uses_wire_form() {
        let json = serde_json::to_string(&Topic::thread("K1")).unwrap();
        assert_eq!(json, "\"comment:K1\"");
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Topic::thread("K1"));
    }
}
