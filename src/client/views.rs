//! Cached views of watched topics
//!
//! Counters in a view are versioned by the id of the event that last wrote
//! them. A snapshot seeds every counter at its `as_of` id and an event only
//! overwrites a counter when its id is newer, so late deliveries through a
//! second topic cannot roll a count back.

use std::collections::{HashMap, HashSet};

use crate::engagement::{ContentSnapshot, ThreadSnapshot};
use crate::realtime::events::SyncEvent;
use crate::types::{ActorId, Comment, CommentId, Content};

use super::cache::RecentSet;
use super::mutation::OptimisticMutation;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    ContentLikes,
    ContentBookmarks,
    ContentComments,
    ViewerLike,
    ViewerBookmark,
    CommentLikes(CommentId),
    CommentReplies(CommentId),
    ViewerCommentLike(CommentId),
}

#[derive(Debug, Clone, Default)]
struct Versions {
    base: u64,
    written: HashMap<Slot, u64>,
}

impl Versions {
    fn starting_at(base: u64) -> Self {
        Self {
            base,
            written: HashMap::new(),
        }
    }

    /// Claim `slot` for `event_id`; false when the held value is at least as new
    fn claim(&mut self, slot: Slot, event_id: u64) -> bool {
        let held = self.written.get(&slot).copied().unwrap_or(self.base);
        if event_id <= held {
            return false;
        }
        self.written.insert(slot, event_id);
        true
    }

    fn write<T>(&mut self, slot: Slot, event_id: u64, target: &mut T, value: T) -> bool {
        if !self.claim(slot, event_id) {
            return false;
        }
        *target = value;
        true
    }
}

/// What an authoritative event is applied with
pub(crate) struct Applying<'a> {
    pub(crate) event_id: u64,
    pub(crate) viewer: &'a ActorId,
    /// Ids deleted this session, never inserted again
    pub(crate) purged: &'a RecentSet<CommentId>,
}

fn adjust(count: &mut u64, up: bool) {
    if up {
        *count += 1;
    } else {
        *count = count.saturating_sub(1);
    }
}

fn set_membership(set: &mut HashSet<CommentId>, id: &CommentId, member: bool) {
    if member {
        set.insert(id.clone());
    } else {
        set.remove(id);
    }
}

fn purge_list(list: &mut Vec<Comment>, liked: &mut HashSet<CommentId>, ids: &[CommentId]) -> bool {
    let before = list.len();
    list.retain(|c| !ids.contains(&c.id));
    for id in ids {
        liked.remove(id);
    }
    list.len() != before
}

/// Cached state of a `content:<id>` topic
#[derive(Debug, Clone)]
pub struct ContentView {
    pub content: Content,
    /// Top-level comments, newest first
    pub comments: Vec<Comment>,
    pub is_liked: bool,
    pub is_bookmarked: bool,
    pub liked_comment_ids: HashSet<CommentId>,
    versions: Versions,
}

impl ContentView {
    pub fn from_snapshot(snapshot: ContentSnapshot) -> Self {
        Self {
            content: snapshot.content,
            comments: snapshot.comments,
            is_liked: snapshot.is_liked,
            is_bookmarked: snapshot.is_bookmarked,
            liked_comment_ids: snapshot.liked_comment_ids.into_iter().collect(),
            versions: Versions::starting_at(snapshot.as_of),
        }
    }

    pub fn comment(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| &c.id == id)
    }

    fn insert_comment(&mut self, comment: &Comment) -> bool {
        if self.comment(&comment.id).is_some() {
            return false;
        }
        let at = self
            .comments
            .iter()
            .position(|c| c.created_at <= comment.created_at)
            .unwrap_or(self.comments.len());
        self.comments.insert(at, comment.clone());
        true
    }

    /// Drop every listed id. Returns whether any comment was removed.
    pub(crate) fn purge(&mut self, ids: &[CommentId]) -> bool {
        purge_list(&mut self.comments, &mut self.liked_comment_ids, ids)
    }

    /// Apply an authoritative event. Returns whether anything changed.
    pub(crate) fn apply(&mut self, at: &Applying<'_>, event: &SyncEvent) -> bool {
        if event.content_id() != &self.content.id {
            return false;
        }
        let id = at.event_id;
        let versions = &mut self.versions;

        match event {
            SyncEvent::CommentCreated(e) => {
                let mut changed = false;
                if !at.purged.contains(&e.comment.id) {
                    changed |= self.insert_comment(&e.comment);
                }
                let versions = &mut self.versions;
                changed
                    | versions.write(
                        Slot::ContentComments,
                        id,
                        &mut self.content.comments_count,
                        e.comments_count,
                    )
            }
            SyncEvent::ReplyCreated(e) => {
                let mut changed = versions.write(
                    Slot::ContentComments,
                    id,
                    &mut self.content.comments_count,
                    e.comments_count,
                );
                if let Some(parent) = self.comments.iter_mut().find(|c| c.id == e.parent_comment_id) {
                    changed |= versions.write(
                        Slot::CommentReplies(parent.id.clone()),
                        id,
                        &mut parent.replies_count,
                        e.parent_replies_count,
                    );
                }
                changed
            }
            SyncEvent::LikeUpdated(e) => {
                let mut changed =
                    versions.write(Slot::ContentLikes, id, &mut self.content.likes_count, e.likes_count);
                if &e.actor_id == at.viewer {
                    changed |= versions.write(Slot::ViewerLike, id, &mut self.is_liked, e.is_liked);
                }
                changed
            }
            SyncEvent::BookmarkUpdated(e) => {
                let mut changed = versions.write(
                    Slot::ContentBookmarks,
                    id,
                    &mut self.content.bookmarks_count,
                    e.bookmarks_count,
                );
                if &e.actor_id == at.viewer {
                    changed |= versions.write(
                        Slot::ViewerBookmark,
                        id,
                        &mut self.is_bookmarked,
                        e.is_bookmarked,
                    );
                }
                changed
            }
            SyncEvent::CommentLikeUpdated(e) => {
                // Only listed comments are tracked here; replies live in threads
                let Some(comment) = self.comments.iter_mut().find(|c| c.id == e.comment_id) else {
                    return false;
                };
                let mut changed = versions.write(
                    Slot::CommentLikes(e.comment_id.clone()),
                    id,
                    &mut comment.likes_count,
                    e.likes_count,
                );
                if &e.actor_id == at.viewer
                    && versions.claim(Slot::ViewerCommentLike(e.comment_id.clone()), id)
                {
                    set_membership(&mut self.liked_comment_ids, &e.comment_id, e.is_liked);
                    changed = true;
                }
                changed
            }
            SyncEvent::CommentDeleted(e) => {
                let mut changed = self.purge(&e.deleted_ids);
                let versions = &mut self.versions;
                changed |= versions.write(
                    Slot::ContentComments,
                    id,
                    &mut self.content.comments_count,
                    e.comments_count,
                );
                if let (Some(parent_id), Some(count)) = (&e.parent_comment_id, e.parent_replies_count) {
                    if let Some(parent) = self.comments.iter_mut().find(|c| &c.id == parent_id) {
                        changed |= versions.write(
                            Slot::CommentReplies(parent_id.clone()),
                            id,
                            &mut parent.replies_count,
                            count,
                        );
                    }
                }
                changed
            }
        }
    }

    /// Apply a local change ahead of the server. Returns whether anything changed.
    pub(crate) fn apply_optimistic(&mut self, mutation: &OptimisticMutation) -> bool {
        match mutation {
            OptimisticMutation::ToggleContentLike { content_id } if *content_id == self.content.id => {
                self.is_liked = !self.is_liked;
                adjust(&mut self.content.likes_count, self.is_liked);
                true
            }
            OptimisticMutation::ToggleBookmark { content_id } if *content_id == self.content.id => {
                self.is_bookmarked = !self.is_bookmarked;
                adjust(&mut self.content.bookmarks_count, self.is_bookmarked);
                true
            }
            OptimisticMutation::ToggleCommentLike { comment_id } => {
                let Some(comment) = self.comments.iter_mut().find(|c| &c.id == comment_id) else {
                    return false;
                };
                let liked = !self.liked_comment_ids.contains(comment_id);
                adjust(&mut comment.likes_count, liked);
                set_membership(&mut self.liked_comment_ids, comment_id, liked);
                true
            }
            OptimisticMutation::InsertComment(comment) if comment.content_id == self.content.id => {
                match &comment.parent_comment_id {
                    None => {
                        if !self.insert_comment(comment) {
                            return false;
                        }
                    }
                    Some(parent_id) => {
                        if let Some(parent) = self.comments.iter_mut().find(|c| &c.id == parent_id) {
                            parent.replies_count += 1;
                        }
                    }
                }
                self.content.comments_count += 1;
                true
            }
            _ => false,
        }
    }
}

/// Cached state of a `comment:<id>` reply thread
#[derive(Debug, Clone)]
pub struct ThreadView {
    pub parent: Comment,
    /// Replies, oldest first
    pub replies: Vec<Comment>,
    pub liked_comment_ids: HashSet<CommentId>,
    /// The parent was deleted; the view accepts nothing further
    pub deleted: bool,
    versions: Versions,
}

fn find_in_thread<'a>(
    parent: &'a mut Comment,
    replies: &'a mut [Comment],
    id: &CommentId,
) -> Option<&'a mut Comment> {
    if &parent.id == id {
        return Some(parent);
    }
    replies.iter_mut().find(|r| &r.id == id)
}

impl ThreadView {
    pub fn from_snapshot(snapshot: ThreadSnapshot) -> Self {
        Self {
            parent: snapshot.parent,
            replies: snapshot.replies,
            liked_comment_ids: snapshot.liked_comment_ids.into_iter().collect(),
            deleted: false,
            versions: Versions::starting_at(snapshot.as_of),
        }
    }

    pub fn reply(&self, id: &CommentId) -> Option<&Comment> {
        self.replies.iter().find(|r| &r.id == id)
    }

    fn insert_reply(&mut self, reply: &Comment) -> bool {
        if self.reply(&reply.id).is_some() {
            return false;
        }
        let at = self
            .replies
            .iter()
            .position(|r| r.created_at > reply.created_at)
            .unwrap_or(self.replies.len());
        self.replies.insert(at, reply.clone());
        true
    }

    pub(crate) fn mark_deleted(&mut self) -> bool {
        if self.deleted {
            return false;
        }
        self.deleted = true;
        self.replies.clear();
        self.liked_comment_ids.clear();
        true
    }

    /// Apply an authoritative event. Returns whether anything changed.
    pub(crate) fn apply(&mut self, at: &Applying<'_>, event: &SyncEvent) -> bool {
        if self.deleted {
            return false;
        }
        let id = at.event_id;

        match event {
            SyncEvent::ReplyCreated(e) if e.parent_comment_id == self.parent.id => {
                let mut changed = false;
                if !at.purged.contains(&e.reply.id) {
                    changed |= self.insert_reply(&e.reply);
                }
                changed
                    | self.versions.write(
                        Slot::CommentReplies(self.parent.id.clone()),
                        id,
                        &mut self.parent.replies_count,
                        e.parent_replies_count,
                    )
            }
            SyncEvent::CommentLikeUpdated(e) => {
                let Some(comment) = find_in_thread(&mut self.parent, &mut self.replies, &e.comment_id)
                else {
                    return false;
                };
                let mut changed = self.versions.write(
                    Slot::CommentLikes(e.comment_id.clone()),
                    id,
                    &mut comment.likes_count,
                    e.likes_count,
                );
                if &e.actor_id == at.viewer
                    && self
                        .versions
                        .claim(Slot::ViewerCommentLike(e.comment_id.clone()), id)
                {
                    set_membership(&mut self.liked_comment_ids, &e.comment_id, e.is_liked);
                    changed = true;
                }
                changed
            }
            SyncEvent::CommentDeleted(e) => {
                if e.deleted_ids.contains(&self.parent.id) {
                    return self.mark_deleted();
                }
                let mut changed =
                    purge_list(&mut self.replies, &mut self.liked_comment_ids, &e.deleted_ids);
                if e.parent_comment_id.as_ref() == Some(&self.parent.id) {
                    if let Some(count) = e.parent_replies_count {
                        changed |= self.versions.write(
                            Slot::CommentReplies(self.parent.id.clone()),
                            id,
                            &mut self.parent.replies_count,
                            count,
                        );
                    }
                }
                changed
            }
            SyncEvent::ReplyCreated(_)
            | SyncEvent::CommentCreated(_)
            | SyncEvent::LikeUpdated(_)
            | SyncEvent::BookmarkUpdated(_) => false,
        }
    }

    /// Apply a local change ahead of the server. Returns whether anything changed.
    pub(crate) fn apply_optimistic(&mut self, mutation: &OptimisticMutation) -> bool {
        if self.deleted {
            return false;
        }
        match mutation {
            OptimisticMutation::ToggleCommentLike { comment_id } => {
                let Some(comment) = find_in_thread(&mut self.parent, &mut self.replies, comment_id)
                else {
                    return false;
                };
                let liked = !self.liked_comment_ids.contains(comment_id);
                adjust(&mut comment.likes_count, liked);
                set_membership(&mut self.liked_comment_ids, comment_id, liked);
                true
            }
            OptimisticMutation::InsertComment(reply)
                if reply.parent_comment_id.as_ref() == Some(&self.parent.id) =>
            {
                if !self.insert_reply(reply) {
                    return false;
                }
                self.parent.replies_count += 1;
                true
            }
            _ => false,
        }
    }
}
