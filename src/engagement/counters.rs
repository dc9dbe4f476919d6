//! Counter consistency guard
//!
//! Likes and bookmarks are stored as membership sets, one per subject. A
//! counter is always the size of its set, so retried or duplicated requests
//! can never drift the count. Each subject has its own mutex; toggles on
//! different subjects never contend. Event ids are drawn while the subject
//! mutex is held.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::clock::EventClock;
use crate::error::Outcome;
use crate::types::{ActorId, CommentId, ContentId, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CounterKind {
    ContentLike,
    CommentLike,
    ContentBookmark,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    kind: CounterKind,
    subject: String,
}

impl CounterKey {
    fn like(subject: &Subject) -> Self {
        match subject {
            Subject::Content(id) => Self {
                kind: CounterKind::ContentLike,
                subject: id.to_string(),
            },
            Subject::Comment(id) => Self {
                kind: CounterKind::CommentLike,
                subject: id.to_string(),
            },
        }
    }

    fn bookmark(content: &ContentId) -> Self {
        Self {
            kind: CounterKind::ContentBookmark,
            subject: content.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Membership {
    members: HashSet<ActorId>,
}

impl Membership {
    fn toggle(&mut self, actor: &ActorId) -> bool {
        if self.members.remove(actor) {
            false
        } else {
            self.members.insert(actor.clone());
            true
        }
    }

    /// Returns whether the set changed
    fn assign(&mut self, actor: &ActorId, member: bool) -> bool {
        if member {
            self.members.insert(actor.clone())
        } else {
            self.members.remove(actor)
        }
    }

    fn count(&self) -> u64 {
        self.members.len() as u64
    }
}

/// Authoritative like state of a subject after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    #[serde(rename = "likesCount")]
    pub likes_count: u64,
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
}

/// Authoritative bookmark state of a content item after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookmarkState {
    #[serde(rename = "bookmarksCount")]
    pub bookmarks_count: u64,
    #[serde(rename = "isBookmarked")]
    pub is_bookmarked: bool,
}

/// A counter change and the event id stamped on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggled<S> {
    pub state: S,
    pub outcome: Outcome,
    /// Allocated only when the set actually changed
    pub event_id: Option<u64>,
}

/// Single writer of like and bookmark counters
#[derive(Debug)]
pub struct CounterGuard {
    subjects: RwLock<HashMap<CounterKey, Arc<Mutex<Membership>>>>,
    clock: Arc<EventClock>,
}

impl Default for CounterGuard {
    fn default() -> Self {
        Self::with_clock(Arc::new(EventClock::new()))
    }
}

impl CounterGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<EventClock>) -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Fetch the per-subject slot, creating it on first use
    fn slot(&self, key: &CounterKey) -> Arc<Mutex<Membership>> {
        if let Some(slot) = self.subjects.read().get(key) {
            return Arc::clone(slot);
        }
        let mut subjects = self.subjects.write();
        Arc::clone(subjects.entry(key.clone()).or_default())
    }

    fn peek<T>(&self, key: &CounterKey, read: impl FnOnce(&Membership) -> T) -> Option<T> {
        let slot = self.subjects.read().get(key).cloned()?;
        let membership = slot.lock();
        Some(read(&membership))
    }

    /// Flip or assign membership under the subject mutex
    fn change(
        &self,
        key: CounterKey,
        actor: &ActorId,
        desired: Option<bool>,
    ) -> Toggled<(u64, bool)> {
        let slot = self.slot(&key);
        let mut membership = slot.lock();
        let (member, changed) = match desired {
            Some(member) => (member, membership.assign(actor, member)),
            None => (membership.toggle(actor), true),
        };
        let (outcome, event_id) = if changed {
            (Outcome::Applied, Some(self.clock.tick()))
        } else {
            (Outcome::AlreadyProcessed, None)
        };
        Toggled {
            state: (membership.count(), member),
            outcome,
            event_id,
        }
    }

    /// Flip `actor`'s like on `subject`
    pub fn toggle_like(&self, subject: &Subject, actor: &ActorId) -> Toggled<LikeState> {
        self.like(subject, actor, None)
    }

    /// Assign `actor`'s like on `subject` to `liked`
    pub fn set_like(&self, subject: &Subject, actor: &ActorId, liked: bool) -> Toggled<LikeState> {
        self.like(subject, actor, Some(liked))
    }

    fn like(
        &self,
        subject: &Subject,
        actor: &ActorId,
        desired: Option<bool>,
    ) -> Toggled<LikeState> {
        let changed = self.change(CounterKey::like(subject), actor, desired);
        let (likes_count, is_liked) = changed.state;
        Toggled {
            state: LikeState {
                likes_count,
                is_liked,
            },
            outcome: changed.outcome,
            event_id: changed.event_id,
        }
    }

    /// Flip `actor`'s bookmark on `content`
    pub fn toggle_bookmark(&self, content: &ContentId, actor: &ActorId) -> Toggled<BookmarkState> {
        self.bookmark(content, actor, None)
    }

    /// Assign `actor`'s bookmark on `content` to `bookmarked`
    pub fn set_bookmark(
        &self,
        content: &ContentId,
        actor: &ActorId,
        bookmarked: bool,
    ) -> Toggled<BookmarkState> {
        self.bookmark(content, actor, Some(bookmarked))
    }

    fn bookmark(
        &self,
        content: &ContentId,
        actor: &ActorId,
        desired: Option<bool>,
    ) -> Toggled<BookmarkState> {
        let changed = self.change(CounterKey::bookmark(content), actor, desired);
        let (bookmarks_count, is_bookmarked) = changed.state;
        Toggled {
            state: BookmarkState {
                bookmarks_count,
                is_bookmarked,
            },
            outcome: changed.outcome,
            event_id: changed.event_id,
        }
    }

    pub fn likes_count(&self, subject: &Subject) -> u64 {
        self.peek(&CounterKey::like(subject), Membership::count)
            .unwrap_or(0)
    }

    pub fn is_liked(&self, subject: &Subject, actor: &ActorId) -> bool {
        self.peek(&CounterKey::like(subject), |m| m.members.contains(actor))
            .unwrap_or(false)
    }

    pub fn bookmarks_count(&self, content: &ContentId) -> u64 {
        self.peek(&CounterKey::bookmark(content), Membership::count)
            .unwrap_or(0)
    }

    pub fn is_bookmarked(&self, content: &ContentId, actor: &ActorId) -> bool {
        self.peek(&CounterKey::bookmark(content), |m| m.members.contains(actor))
            .unwrap_or(false)
    }

    /// Actors currently liking `subject`, sorted
    pub fn liked_by(&self, subject: &Subject) -> Vec<ActorId> {
        let mut actors = self
            .peek(&CounterKey::like(subject), |m| {
                m.members.iter().cloned().collect::<Vec<_>>()
            })
            .unwrap_or_default();
        actors.sort();
        actors
    }

    /// Drop the like sets of removed comments
    pub fn forget_comments<'a>(&self, ids: impl IntoIterator<Item = &'a CommentId>) {
        let mut subjects = self.subjects.write();
        for id in ids {
            subjects.remove(&CounterKey::like(&Subject::Comment(id.clone())));
        }
    }

    /// Number of subjects with a membership set
    pub fn tracked_subjects(&self) -> usize {
        self.subjects.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn content(id: &str) -> Subject {
        Subject::Content(ContentId::new(id))
    }

    #[test]
    fn test_toggle_twice_restores_original_state() {
        let guard = CounterGuard::new();
        let subject = content("C1");
        let actor = ActorId::new("alice");

        let first = guard.toggle_like(&subject, &actor);
        assert_eq!(first.state, LikeState { likes_count: 1, is_liked: true });
        assert_eq!(first.event_id, Some(1));

        let second = guard.toggle_like(&subject, &actor);
        assert_eq!(second.state, LikeState { likes_count: 0, is_liked: false });
        assert_eq!(second.event_id, Some(2));
        assert!(!guard.is_liked(&subject, &actor));
    }

    #[test]
    fn test_count_matches_membership_after_mixed_toggles() {
        let guard = CounterGuard::new();
        let subject = Subject::Comment(CommentId::new("K1"));
        let actors: Vec<ActorId> = (0..5).map(|i| ActorId::new(format!("u{}", i))).collect();

        for (round, actor) in actors.iter().cycle().take(13).enumerate() {
            let state = guard.toggle_like(&subject, actor).state;
            assert_eq!(state.likes_count, guard.liked_by(&subject).len() as u64, "round {}", round);
        }
        assert_eq!(guard.likes_count(&subject), guard.liked_by(&subject).len() as u64);
    }

    #[test]
    fn test_set_like_reports_already_processed() {
        let guard = CounterGuard::new();
        let subject = content("C1");
        let actor = ActorId::new("bob");

        let first = guard.set_like(&subject, &actor, true);
        assert_eq!(first.outcome, Outcome::Applied);
        assert_eq!(first.state.likes_count, 1);

        let again = guard.set_like(&subject, &actor, true);
        assert_eq!(again.outcome, Outcome::AlreadyProcessed);
        assert_eq!(again.state.likes_count, 1);
        assert_eq!(again.event_id, None);
    }

    #[test]
    fn test_bookmarks_and_likes_are_independent() {
        let guard = CounterGuard::new();
        let id = ContentId::new("C1");
        let actor = ActorId::new("carol");

        let bookmark = guard.toggle_bookmark(&id, &actor).state;
        assert_eq!(bookmark, BookmarkState { bookmarks_count: 1, is_bookmarked: true });
        assert_eq!(guard.likes_count(&Subject::Content(id.clone())), 0);
        assert!(guard.is_bookmarked(&id, &actor));
    }

    #[test]
    fn test_concurrent_toggles_by_same_actor_net_out() {
        let guard = Arc::new(CounterGuard::new());
        let subject = content("C1");
        let actor = ActorId::new("x");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let subject = subject.clone();
                let actor = actor.clone();
                thread::spawn(move || guard.toggle_like(&subject, &actor).state)
            })
            .collect();
        let mut results: Vec<LikeState> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort_by_key(|s| s.likes_count);

        // Serialized per subject: one toggle saw the empty set, the other undid it
        assert_eq!(results[0], LikeState { likes_count: 0, is_liked: false });
        assert_eq!(results[1], LikeState { likes_count: 1, is_liked: true });
        assert_eq!(guard.likes_count(&subject), 0);
    }

    #[test]
    fn test_concurrent_duplicate_like_requests_count_once() {
        let guard = Arc::new(CounterGuard::new());
        let subject = content("C1");
        let actor = ActorId::new("x");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let subject = subject.clone();
                let actor = actor.clone();
                thread::spawn(move || guard.set_like(&subject, &actor, true).outcome)
            })
            .collect();
        let outcomes: Vec<Outcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 1);
        assert_eq!(guard.likes_count(&subject), 1);
    }

    #[test]
    fn test_forget_comments_drops_membership() {
        let guard = CounterGuard::new();
        let id = CommentId::new("R1");
        guard.toggle_like(&Subject::Comment(id.clone()), &ActorId::new("a"));
        assert_eq!(guard.tracked_subjects(), 1);

        guard.forget_comments([&id]);
        assert_eq!(guard.tracked_subjects(), 0);
        assert_eq!(guard.likes_count(&Subject::Comment(id)), 0);
    }
}
