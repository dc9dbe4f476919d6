//! Client reconciliation cache
//!
//! A pure state machine for one local actor. The transport feeds it server
//! frames and snapshot responses, the UI feeds it optimistic mutations, and
//! it answers with the topics that need a refetch. Nothing here does I/O.
//!
//! Every watched topic carries the epoch it was (re)opened in. A reconnect
//! or a lagged frame starts a new epoch: all views go back to pending and
//! only a snapshot fetched for the current epoch brings a topic back to
//! ready.
//!
//! Each topic also keeps a bounded log of the events it was fed. Whenever a
//! snapshot is installed, pending or not, the logged events newer than its
//! `as_of` are replayed over it, so a snapshot that was read before an event
//! can never hide that event.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::engagement::{ContentSnapshot, ThreadSnapshot};
use crate::error::{SyncError, SyncResult};
use crate::realtime::events::{DeliveredEvent, EventEnvelope, ServerMessage, SyncEvent};
use crate::types::{ActorId, CommentId, ConnectionId, ContentId, Topic};

use super::composer::{ReplyComposer, ReplyDraft};
use super::mutation::OptimisticMutation;
use super::views::{Applying, ContentView, ThreadView};

/// Event ids remembered for duplicate detection
const APPLIED_WINDOW: usize = 1024;
/// Events logged per topic for replay over a snapshot
const TOPIC_LOG_LIMIT: usize = 256;
/// Comment ids remembered as confirmed or deleted
const COMMENT_WINDOW: usize = 4096;

/// What the cache did with an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// At least one cached view changed
    Applied,
    /// Accepted, but no cached view was affected
    Unchanged,
    /// Already applied through another topic or a redelivery
    Duplicate,
    /// Held until the snapshot of a pending topic arrives
    Buffered,
    /// Views were dropped back to pending and queued for refetch
    Invalidated,
    /// Not something the cache tracks
    Ignored,
}

/// A topic whose snapshot must be fetched and passed back with `epoch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefetchRequest {
    pub topic: Topic,
    pub epoch: u64,
}

/// Insertion-ordered set that forgets its oldest members past `limit`
#[derive(Debug)]
pub(crate) struct RecentSet<T> {
    members: HashSet<T>,
    order: VecDeque<T>,
    limit: usize,
}

impl<T: Eq + Hash + Clone> RecentSet<T> {
    fn with_limit(limit: usize) -> Self {
        Self {
            members: HashSet::new(),
            order: VecDeque::new(),
            limit,
        }
    }

    /// Returns false if `value` is already remembered
    fn insert(&mut self, value: T) -> bool {
        if !self.members.insert(value.clone()) {
            return false;
        }
        self.order.push_back(value);
        if self.order.len() > self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    pub(crate) fn contains(&self, value: &T) -> bool {
        self.members.contains(value)
    }

    fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
    }
}

#[derive(Debug)]
struct Entry<V> {
    /// `None` until a snapshot for the current epoch is installed
    view: Option<V>,
    /// `as_of` of the snapshot the view was built from
    base: u64,
    /// Events fed to this topic, oldest first
    log: VecDeque<EventEnvelope>,
    /// Highest event id evicted from `log`
    evicted_through: u64,
}

impl<V> Entry<V> {
    fn pending() -> Self {
        Entry {
            view: None,
            base: 0,
            log: VecDeque::new(),
            evicted_through: 0,
        }
    }

    fn view(&self) -> Option<&V> {
        self.view.as_ref()
    }

    fn record(&mut self, envelope: &EventEnvelope) {
        self.log.push_back(envelope.clone());
        if self.log.len() > TOPIC_LOG_LIMIT {
            if let Some(oldest) = self.log.pop_front() {
                self.evicted_through = self.evicted_through.max(oldest.event_id);
            }
        }
    }

    /// Install `view`, built from a snapshot taken at `as_of`, and replay
    /// the logged events it does not contain
    fn install(
        &mut self,
        as_of: u64,
        mut view: V,
        mut replay: impl FnMut(&mut V, &EventEnvelope),
    ) -> Installed {
        if self.view.is_some() && as_of < self.base {
            return Installed::Outdated;
        }
        if self.evicted_through > as_of {
            return Installed::Gap;
        }
        for envelope in self.log.iter().filter(|e| e.event_id > as_of) {
            replay(&mut view, envelope);
        }
        self.view = Some(view);
        self.base = as_of;
        Installed::Replaced
    }
}

enum Installed {
    Replaced,
    /// Older than the snapshot the ready view was built from
    Outdated,
    /// Events after `as_of` were evicted from the log
    Gap,
}

enum Fed {
    Changed(bool),
    Buffered,
}

/// Log `envelope` and apply it if the view is ready
fn feed<V>(
    entry: &mut Entry<V>,
    envelope: &EventEnvelope,
    apply: impl FnOnce(&mut V) -> bool,
) -> Fed {
    entry.record(envelope);
    match entry.view.as_mut() {
        Some(view) => Fed::Changed(apply(view)),
        None => Fed::Buffered,
    }
}

/// Threads an event can touch
fn affected_threads(event: &SyncEvent) -> Vec<&CommentId> {
    match event {
        SyncEvent::ReplyCreated(e) => vec![&e.parent_comment_id],
        SyncEvent::CommentLikeUpdated(e) => {
            vec![e.parent_comment_id.as_ref().unwrap_or(&e.comment_id)]
        }
        SyncEvent::CommentDeleted(e) => {
            let mut threads: Vec<&CommentId> = e.deleted_ids.iter().collect();
            threads.extend(e.parent_comment_id.as_ref());
            threads
        }
        SyncEvent::CommentCreated(_)
        | SyncEvent::LikeUpdated(_)
        | SyncEvent::BookmarkUpdated(_) => Vec::new(),
    }
}

pub struct ReconciliationCache {
    viewer: ActorId,
    epoch: u64,
    connection: Option<ConnectionId>,
    contents: HashMap<ContentId, Entry<ContentView>>,
    threads: HashMap<CommentId, Entry<ThreadView>>,
    composers: HashMap<CommentId, ReplyComposer>,
    /// Queued for the next `take_refetch_requests`
    refetch: BTreeSet<Topic>,
    /// Handed out in the current epoch and not answered yet
    in_flight: HashSet<Topic>,
    applied: RecentSet<u64>,
    /// Comments confirmed by an authoritative create event
    confirmed: RecentSet<CommentId>,
    /// Comments known to be deleted
    purged: RecentSet<CommentId>,
}

impl ReconciliationCache {
    pub fn new(viewer: impl Into<ActorId>) -> Self {
        Self {
            viewer: viewer.into(),
            epoch: 0,
            connection: None,
            contents: HashMap::new(),
            threads: HashMap::new(),
            composers: HashMap::new(),
            refetch: BTreeSet::new(),
            in_flight: HashSet::new(),
            applied: RecentSet::with_limit(APPLIED_WINDOW),
            confirmed: RecentSet::with_limit(COMMENT_WINDOW),
            purged: RecentSet::with_limit(COMMENT_WINDOW),
        }
    }

    pub fn viewer(&self) -> &ActorId {
        &self.viewer
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // ========================================================================
    // Topics
    // ========================================================================

    /// Start caching `topic`. The view stays pending until its snapshot is
    /// loaded; returns the epoch the snapshot must be fetched for.
    pub fn watch(&mut self, topic: Topic) -> u64 {
        let added = match &topic {
            Topic::Content(id) if !self.contents.contains_key(id) => {
                self.contents.insert(id.clone(), Entry::pending());
                true
            }
            Topic::CommentThread(id) if !self.threads.contains_key(id) => {
                self.threads.insert(id.clone(), Entry::pending());
                true
            }
            _ => false,
        };
        if added {
            self.queue_refetch(topic);
        }
        self.epoch
    }

    /// Stop caching `topic`. Returns whether it was watched.
    pub fn unwatch(&mut self, topic: &Topic) -> bool {
        self.refetch.remove(topic);
        self.in_flight.remove(topic);
        match topic {
            Topic::Content(id) => self.contents.remove(id).is_some(),
            Topic::CommentThread(id) => self.threads.remove(id).is_some(),
        }
    }

    pub fn is_watching(&self, topic: &Topic) -> bool {
        match topic {
            Topic::Content(id) => self.contents.contains_key(id),
            Topic::CommentThread(id) => self.threads.contains_key(id),
        }
    }

    /// Watched and waiting for a snapshot
    pub fn is_stale(&self, topic: &Topic) -> bool {
        match topic {
            Topic::Content(id) => self.contents.get(id).is_some_and(|e| e.view.is_none()),
            Topic::CommentThread(id) => self.threads.get(id).is_some_and(|e| e.view.is_none()),
        }
    }

    pub fn watched_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .contents
            .keys()
            .cloned()
            .map(Topic::Content)
            .chain(self.threads.keys().cloned().map(Topic::CommentThread))
            .collect();
        topics.sort();
        topics
    }

    pub fn content_view(&self, id: &ContentId) -> Option<&ContentView> {
        self.contents.get(id).and_then(Entry::view)
    }

    pub fn thread_view(&self, id: &CommentId) -> Option<&ThreadView> {
        self.threads.get(id).and_then(Entry::view)
    }

    /// Queue a snapshot fetch unless one is already queued or in flight
    fn queue_refetch(&mut self, topic: Topic) -> bool {
        if self.in_flight.contains(&topic) {
            return false;
        }
        self.refetch.insert(topic)
    }

    /// Ask for a fresh snapshot of a watched topic, for instance after a
    /// mutation timed out. The current view stays in place meanwhile.
    /// Returns false if the topic is unwatched or a fetch is already due.
    pub fn request_refetch(&mut self, topic: Topic) -> bool {
        self.is_watching(&topic) && self.queue_refetch(topic)
    }

    /// Topics to refetch, in a stable order. Each is reported once per
    /// epoch until its snapshot is loaded or the fetch is reported failed.
    pub fn take_refetch_requests(&mut self) -> Vec<RefetchRequest> {
        let epoch = self.epoch;
        let topics = std::mem::take(&mut self.refetch);
        self.in_flight.extend(topics.iter().cloned());
        topics
            .into_iter()
            .map(|topic| RefetchRequest { topic, epoch })
            .collect()
    }

    /// A fetch handed out by `take_refetch_requests` failed; queue it again
    pub fn on_refetch_failed(&mut self, topic: &Topic) -> bool {
        self.in_flight.remove(topic);
        self.is_watching(topic) && self.queue_refetch(topic.clone())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    fn check_epoch(&self, topic: &Topic, epoch: u64) -> SyncResult<()> {
        if epoch != self.epoch || !self.is_watching(topic) {
            tracing::debug!(topic = %topic, epoch, current = self.epoch, "discarding snapshot");
            return Err(SyncError::StaleSnapshot {
                topic: topic.to_string(),
                epoch,
            });
        }
        Ok(())
    }

    fn settle(&mut self, topic: Topic, installed: Installed, was_ready: bool) -> Reconciled {
        self.in_flight.remove(&topic);
        match installed {
            Installed::Replaced => {
                self.refetch.remove(&topic);
                Reconciled::Applied
            }
            Installed::Outdated => {
                tracing::debug!(topic = %topic, "snapshot older than the cached view");
                Reconciled::Unchanged
            }
            Installed::Gap => {
                tracing::debug!(topic = %topic, "snapshot misses evicted events, refetching");
                self.queue_refetch(topic);
                if was_ready {
                    Reconciled::Unchanged
                } else {
                    Reconciled::Invalidated
                }
            }
        }
    }

    /// Install a content snapshot fetched for `epoch`
    pub fn load_content_snapshot(
        &mut self,
        snapshot: ContentSnapshot,
        epoch: u64,
    ) -> SyncResult<Reconciled> {
        let id = snapshot.content.id.clone();
        let topic = Topic::Content(id.clone());
        self.check_epoch(&topic, epoch)?;

        let as_of = snapshot.as_of;
        let view = ContentView::from_snapshot(snapshot);
        let Some(entry) = self.contents.get_mut(&id) else {
            return Ok(Reconciled::Ignored);
        };
        let was_ready = entry.view.is_some();
        let (viewer, purged) = (&self.viewer, &self.purged);
        let installed = entry.install(as_of, view, |view, envelope| {
            let at = Applying {
                event_id: envelope.event_id,
                viewer,
                purged,
            };
            view.apply(&at, &envelope.event);
        });
        Ok(self.settle(topic, installed, was_ready))
    }

    /// Install a thread snapshot fetched for `epoch`
    pub fn load_thread_snapshot(
        &mut self,
        snapshot: ThreadSnapshot,
        epoch: u64,
    ) -> SyncResult<Reconciled> {
        let id = snapshot.parent.id.clone();
        let topic = Topic::CommentThread(id.clone());
        self.check_epoch(&topic, epoch)?;

        let as_of = snapshot.as_of;
        let mut view = ThreadView::from_snapshot(snapshot);
        if self.purged.contains(&id) {
            view.mark_deleted();
        }
        let Some(entry) = self.threads.get_mut(&id) else {
            return Ok(Reconciled::Ignored);
        };
        let was_ready = entry.view.is_some();
        let (viewer, purged) = (&self.viewer, &self.purged);
        let installed = entry.install(as_of, view, |view, envelope| {
            let at = Applying {
                event_id: envelope.event_id,
                viewer,
                purged,
            };
            view.apply(&at, &envelope.event);
        });
        Ok(self.settle(topic, installed, was_ready))
    }

    /// A refetch found the topic gone: the content or the thread parent
    /// was deleted before the snapshot could be taken
    pub fn on_refetch_not_found(&mut self, topic: &Topic) -> Reconciled {
        self.refetch.remove(topic);
        self.in_flight.remove(topic);
        match topic {
            Topic::Content(id) => {
                if self.contents.remove(id).is_none() {
                    return Reconciled::Ignored;
                }
            }
            Topic::CommentThread(id) => {
                self.purged.insert(id.clone());
                if let Some(composer) = self.composers.get_mut(id) {
                    composer.mark_parent_deleted();
                }
                if self.threads.remove(id).is_none() {
                    return Reconciled::Ignored;
                }
            }
        }
        Reconciled::Applied
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Start a new epoch: every view goes pending and is queued for refetch
    fn invalidate_all(&mut self, reason: &str) -> u64 {
        self.epoch += 1;
        for entry in self.contents.values_mut() {
            *entry = Entry::pending();
        }
        for entry in self.threads.values_mut() {
            *entry = Entry::pending();
        }
        self.in_flight.clear();
        self.refetch = self.watched_topics().into_iter().collect();
        self.applied.clear();
        tracing::debug!(
            reason,
            epoch = self.epoch,
            topics = self.refetch.len(),
            "invalidated cache"
        );
        self.epoch
    }


    /// The transport reconnected; events may have been missed
    pub fn on_reconnect(&mut self) -> u64 {
        self.invalidate_all("reconnect")
    }

    /// The server dropped deliveries for this connection
    pub fn on_lagged(&mut self) -> u64 {
        self.invalidate_all("lagged")
    }

    /// Feed one server frame
    pub fn handle_server_message(&mut self, message: &ServerMessage) -> Reconciled {
        match message {
            ServerMessage::Event(delivered) => self.apply_authoritative(delivered),
            ServerMessage::Connected { connection_id } => {
                match self.connection.replace(*connection_id) {
                    Some(previous) if previous != *connection_id => {
                        self.on_reconnect();
                        Reconciled::Invalidated
                    }
                    _ => Reconciled::Ignored,
                }
            }
            message if message.is_lagged() => {
                self.on_lagged();
                Reconciled::Invalidated
            }
            ServerMessage::Subscribed { .. }
            | ServerMessage::Unsubscribed { .. }
            | ServerMessage::Pong
            | ServerMessage::Error { .. } => Reconciled::Ignored,
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Apply a server event. The first delivery of an event updates every
    /// cached view it touches, whichever topic it arrived on; later
    /// deliveries of the same event are duplicates.
    pub fn apply_authoritative(&mut self, delivered: &DeliveredEvent) -> Reconciled {
        let envelope = &delivered.envelope;
        if !self.applied.insert(envelope.event_id) {
            return Reconciled::Duplicate;
        }
        let event = &envelope.event;

        let mut changed = false;
        match event {
            SyncEvent::CommentCreated(e) => {
                self.confirmed.insert(e.comment.id.clone());
            }
            SyncEvent::ReplyCreated(e) => {
                self.confirmed.insert(e.reply.id.clone());
            }
            SyncEvent::CommentDeleted(e) => {
                for id in &e.deleted_ids {
                    self.purged.insert(id.clone());
                    if let Some(composer) = self.composers.get_mut(id) {
                        changed |= composer.mark_parent_deleted();
                    }
                }
            }
            SyncEvent::LikeUpdated(_)
            | SyncEvent::BookmarkUpdated(_)
            | SyncEvent::CommentLikeUpdated(_) => {}
        }

        let at = Applying {
            event_id: envelope.event_id,
            viewer: &self.viewer,
            purged: &self.purged,
        };
        let mut buffered = false;

        if let Some(entry) = self.contents.get_mut(event.content_id()) {
            match feed(entry, envelope, |view| view.apply(&at, event)) {
                Fed::Changed(c) => changed |= c,
                Fed::Buffered => buffered = true,
            }
        }
        for thread_id in affected_threads(event) {
            if let Some(entry) = self.threads.get_mut(thread_id) {
                match feed(entry, envelope, |view| view.apply(&at, event)) {
                    Fed::Changed(c) => changed |= c,
                    Fed::Buffered => buffered = true,
                }
            }
        }

        if changed {
            Reconciled::Applied
        } else if buffered {
            Reconciled::Buffered
        } else {
            Reconciled::Unchanged
        }
    }

    /// Apply a local change ahead of server confirmation
    pub fn apply_optimistic(&mut self, mutation: &OptimisticMutation) -> Reconciled {
        if let OptimisticMutation::InsertComment(comment) = mutation {
            let parent_gone = comment
                .parent_comment_id
                .as_ref()
                .is_some_and(|p| self.purged.contains(p));
            let settled =
                self.purged.contains(&comment.id) || self.confirmed.contains(&comment.id);
            if parent_gone || settled {
                return Reconciled::Unchanged;
            }
        }

        let mut changed = false;
        for entry in self.contents.values_mut() {
            if let Some(view) = entry.view.as_mut() {
                changed |= view.apply_optimistic(mutation);
            }
        }
        for entry in self.threads.values_mut() {
            if let Some(view) = entry.view.as_mut() {
                changed |= view.apply_optimistic(mutation);
            }
        }

        if changed {
            Reconciled::Applied
        } else {
            Reconciled::Unchanged
        }
    }

    // ========================================================================
    // Reply composers
    // ========================================================================

    /// Open (or return) the composer for replies to `parent`. A composer on
    /// an already deleted comment starts out deleted.
    pub fn open_composer(&mut self, parent: CommentId) -> &mut ReplyComposer {
        let deleted = self.purged.contains(&parent)
            || self.thread_view(&parent).is_some_and(|view| view.deleted);
        let composer = self
            .composers
            .entry(parent.clone())
            .or_insert_with(|| ReplyComposer::new(parent));
        if deleted {
            composer.mark_parent_deleted();
        }
        composer
    }

    pub fn composer(&self, parent: &CommentId) -> Option<&ReplyComposer> {
        self.composers.get(parent)
    }

    pub fn composer_mut(&mut self, parent: &CommentId) -> Option<&mut ReplyComposer> {
        self.composers.get_mut(parent)
    }

    pub fn close_composer(&mut self, parent: &CommentId) -> Option<ReplyComposer> {
        self.composers.remove(parent)
    }

    /// Take the composer's draft for sending
    pub fn submit_reply(&mut self, parent: &CommentId) -> SyncResult<ReplyDraft> {
        if self.purged.contains(parent) {
            if let Some(composer) = self.composers.get_mut(parent) {
                composer.mark_parent_deleted();
            }
            return Err(SyncError::ParentDeleted(parent.clone()));
        }
        self.composers
            .get_mut(parent)
            .ok_or_else(|| SyncError::NotFound {
                kind: "composer",
                id: parent.to_string(),
            })?
            .submit()
    }
}
