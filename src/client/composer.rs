//! Reply composer state
//!
//! A composer is bound to one top-level comment. Once that comment is
//! deleted the composer moves to [`ComposerState::Deleted`] for good and
//! every further submit is refused.

use crate::error::{SyncError, SyncResult};
use crate::types::CommentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    Editing,
    /// A reply was handed to the caller and has not been confirmed yet
    Submitting,
    /// The parent comment is gone
    Deleted,
}

/// A reply ready to be sent to the persistence layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub parent_comment_id: CommentId,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ReplyComposer {
    parent_comment_id: CommentId,
    draft: String,
    state: ComposerState,
}

impl ReplyComposer {
    pub fn new(parent_comment_id: CommentId) -> Self {
        Self {
            parent_comment_id,
            draft: String::new(),
            state: ComposerState::Editing,
        }
    }

    pub fn parent_comment_id(&self) -> &CommentId {
        &self.parent_comment_id
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn state(&self) -> ComposerState {
        self.state
    }

    pub fn is_deleted(&self) -> bool {
        self.state == ComposerState::Deleted
    }

    pub fn set_draft(&mut self, text: impl Into<String>) -> SyncResult<()> {
        if self.is_deleted() {
            return Err(SyncError::ParentDeleted(self.parent_comment_id.clone()));
        }
        self.draft = text.into();
        Ok(())
    }

    /// Hand the draft out for sending
    pub fn submit(&mut self) -> SyncResult<ReplyDraft> {
        match self.state {
            ComposerState::Deleted => Err(SyncError::ParentDeleted(self.parent_comment_id.clone())),
            ComposerState::Submitting => Err(SyncError::ReplyInFlight(self.parent_comment_id.clone())),
            ComposerState::Editing => {
                let body = self.draft.trim();
                if body.is_empty() {
                    return Err(SyncError::EmptyReply);
                }
                let draft = ReplyDraft {
                    parent_comment_id: self.parent_comment_id.clone(),
                    body: body.to_string(),
                };
                self.state = ComposerState::Submitting;
                Ok(draft)
            }
        }
    }

    /// The submitted reply was persisted
    pub fn confirm(&mut self) {
        if self.state == ComposerState::Submitting {
            self.draft.clear();
            self.state = ComposerState::Editing;
        }
    }

    /// The submitted reply was rejected; the draft is kept for another try
    pub fn reject(&mut self) {
        if self.state == ComposerState::Submitting {
            self.state = ComposerState::Editing;
        }
    }

    /// Terminal: the draft stays readable but can no longer be sent
    pub(crate) fn mark_parent_deleted(&mut self) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.state = ComposerState::Deleted;
        true
    }
}
