//! Event broadcaster
//!
//! Wraps each mutation in one immutable [`EventEnvelope`] and pushes it to
//! every subscriber of every affected topic. Delivery is best effort:
//!
//! - a closed connection is pruned from the registry and skipped
//! - a full outbound queue drops the delivery and marks the connection as
//!   lagged, so its socket task tells the client to refetch
//!
//! Neither case affects the other subscribers of the topic.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use super::events::{EventEnvelope, SyncEvent};
use super::registry::{Delivery, SubscriptionRegistry};
use crate::engagement::EventClock;
use crate::error::SyncError;
use crate::types::{ConnectionId, Topic};

/// Outcome of publishing to one topic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub lagged: Vec<ConnectionId>,
    pub pruned: Vec<ConnectionId>,
}

/// Outcome of dispatching one event to all its topics
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event_id: u64,
    pub topics: Vec<(Topic, DeliveryReport)>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.topics.iter().map(|(_, r)| r.delivered).sum()
    }
}

pub struct EventBroadcaster {
    registry: Arc<SubscriptionRegistry>,
    clock: Arc<EventClock>,
}

impl EventBroadcaster {
    /// `clock` is shared with the ledger that stamps mutations
    pub fn new(registry: Arc<SubscriptionRegistry>, clock: Arc<EventClock>) -> Self {
        Self { registry, clock }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Id of the most recently issued event (0 before the first one)
    pub fn current_event_id(&self) -> u64 {
        self.clock.current()
    }

    /// Wrap an event already stamped with `event_id`
    pub fn envelope(&self, event_id: u64, event: SyncEvent) -> Arc<EventEnvelope> {
        Arc::new(EventEnvelope {
            event_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
            event,
        })
    }

    /// Deliver `envelope` to every current subscriber of `topic`, at most
    /// once per connection
    pub fn publish(&self, topic: &Topic, envelope: &Arc<EventEnvelope>) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for subscriber in self.registry.recipients(topic) {
            let delivery = Delivery {
                topic: topic.clone(),
                envelope: Arc::clone(envelope),
            };
            match subscriber.tx.try_send(delivery) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    subscriber.lagged.store(true, Ordering::Release);
                    tracing::warn!(
                        connection = %subscriber.id,
                        topic = %topic,
                        event_id = envelope.event_id,
                        "outbound queue full, dropping delivery"
                    );
                    report.lagged.push(subscriber.id);
                }
                Err(TrySendError::Closed(_)) => {
                    let error = SyncError::DeliveryFailure(subscriber.id);
                    tracing::warn!(topic = %topic, "{}, pruning subscriber", error);
                    self.registry.disconnect(subscriber.id);
                    report.pruned.push(subscriber.id);
                }
            }
        }

        report
    }

    /// Stamp `event` with a fresh id and publish it
    pub fn dispatch(&self, event: SyncEvent) -> DispatchReport {
        let event_id = self.clock.tick();
        self.dispatch_stamped(event_id, event)
    }

    /// Publish one event to every topic it targets. All deliveries of a
    /// multi-topic event share the same envelope.
    pub fn dispatch_stamped(&self, event_id: u64, event: SyncEvent) -> DispatchReport {
        let topics = event.topics();
        let kind = event.kind();
        let envelope = self.envelope(event_id, event);

        let topics: Vec<(Topic, DeliveryReport)> = topics
            .into_iter()
            .map(|topic| {
                let report = self.publish(&topic, &envelope);
                (topic, report)
            })
            .collect();

        let report = DispatchReport {
            event_id: envelope.event_id,
            topics,
        };
        tracing::info!(
            kind,
            event_id = report.event_id,
            delivered = report.delivered(),
            "dispatched event"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::{BookmarkUpdated, CommentDeleted};
    use crate::types::{ActorId, CommentId, ContentId};

    fn broadcaster_for(registry: &Arc<SubscriptionRegistry>) -> EventBroadcaster {
        EventBroadcaster::new(Arc::clone(registry), Arc::new(EventClock::new()))
    }

    fn bookmark(count: u64) -> SyncEvent {
        SyncEvent::BookmarkUpdated(BookmarkUpdated {
            content_id: ContentId::new("C1"),
            bookmarks_count: count,
            actor_id: ActorId::new("a"),
            is_bookmarked: true,
        })
    }

    #[tokio::test]
    async fn test_publish_reaches_only_topic_subscribers() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = broadcaster_for(&registry);
        let (on_topic, mut rx_on) = registry.connect(8);
        let (_off_topic, mut rx_off) = registry.connect(8);
        on_topic.subscribe(Topic::content("C1")).unwrap();

        let report = broadcaster.dispatch(bookmark(1));
        assert_eq!(report.delivered(), 1);

        let delivery = rx_on.recv().await.unwrap();
        assert_eq!(delivery.topic, Topic::content("C1"));
        assert_eq!(delivery.envelope.event_id, 1);
        assert!(rx_off.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_two_topic_event_shares_one_envelope() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = broadcaster_for(&registry);
        let (conn, mut rx) = registry.connect(8);
        conn.subscribe(Topic::content("C1")).unwrap();
        conn.subscribe(Topic::thread("K1")).unwrap();

        broadcaster.dispatch(SyncEvent::CommentDeleted(CommentDeleted {
            comment_id: CommentId::new("K1"),
            parent_comment_id: None,
            content_id: ContentId::new("C1"),
            deleted_ids: vec![CommentId::new("K1")],
            comments_count: 0,
            parent_replies_count: None,
        }));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(Arc::ptr_eq(&first.envelope, &second.envelope));
        assert_ne!(first.topic, second.topic);
    }

    #[tokio::test]
    async fn test_reply_deletion_reaches_parent_thread() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = broadcaster_for(&registry);
        let (conn, mut rx) = registry.connect(8);
        conn.subscribe(Topic::thread("K1")).unwrap();

        let report = broadcaster.dispatch_stamped(
            42,
            SyncEvent::CommentDeleted(CommentDeleted {
                comment_id: CommentId::new("R1"),
                parent_comment_id: Some(CommentId::new("K1")),
                content_id: ContentId::new("C1"),
                deleted_ids: vec![CommentId::new("R1")],
                comments_count: 1,
                parent_replies_count: Some(0),
            }),
        );
        assert_eq!(report.topics.len(), 3);

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.topic, Topic::thread("K1"));
        assert_eq!(delivery.envelope.event_id, 42);
    }

    #[tokio::test]
    async fn test_closed_connection_is_pruned_without_blocking_others() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = broadcaster_for(&registry);
        let (dead, dead_rx) = registry.connect(8);
        let (live, mut live_rx) = registry.connect(8);
        dead.subscribe(Topic::content("C1")).unwrap();
        live.subscribe(Topic::content("C1")).unwrap();
        drop(dead_rx);

        let report = broadcaster.dispatch(bookmark(2));
        let (_, topic_report) = &report.topics[0];
        assert_eq!(topic_report.delivered, 1);
        assert_eq!(topic_report.pruned, vec![dead.id()]);
        assert!(live_rx.recv().await.is_some());
        assert_eq!(registry.subscribers_of(&Topic::content("C1")).len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_marks_connection_lagged() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = broadcaster_for(&registry);
        let (conn, mut rx) = registry.connect(1);
        conn.subscribe(Topic::content("C1")).unwrap();

        broadcaster.dispatch(bookmark(1));
        let report = broadcaster.dispatch(bookmark(2));
        assert_eq!(report.topics[0].1.lagged, vec![conn.id()]);
        assert!(conn.take_lagged());
        assert!(!conn.take_lagged());

        let kept = rx.recv().await.unwrap();
        assert_eq!(kept.envelope.event_id, 1);
    }

    #[tokio::test]
    async fn test_per_topic_fifo() {
        let registry = SubscriptionRegistry::new();
        let broadcaster = broadcaster_for(&registry);
        let (conn, mut rx) = registry.connect(64);
        conn.subscribe(Topic::content("C1")).unwrap();

        for count in 1..=20 {
            broadcaster.dispatch(bookmark(count));
        }
        for expected in 1..=20u64 {
            let delivery = rx.recv().await.unwrap();
            match &delivery.envelope.event {
                SyncEvent::BookmarkUpdated(e) => assert_eq!(e.bookmarks_count, expected),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }
}
