//! Subscription registry
//!
//! Tracks which connection listens to which topic. Each connection is
//! registered with its outbound queue; [`ConnectionGuard`] removes the
//! connection and every one of its subscriptions when dropped, so a closed
//! socket can never linger as a subscriber.
//!
//! Lock order is always `connections` before `topics`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::events::{DeliveredEvent, EventEnvelope};
use crate::error::{Outcome, SyncError, SyncResult};
use crate::types::{ConnectionId, Topic};

/// One queued delivery: the shared event plus the topic it was published on
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: Topic,
    pub envelope: Arc<EventEnvelope>,
}

impl Delivery {
    /// Owned wire form, as the client receives it
    pub fn to_delivered(&self) -> DeliveredEvent {
        DeliveredEvent {
            topic: self.topic.clone(),
            envelope: self.envelope.as_ref().clone(),
        }
    }
}

/// Outbound side of a connection as seen by publishers
#[derive(Debug, Clone)]
pub(crate) struct Subscriber {
    pub(crate) id: ConnectionId,
    pub(crate) tx: mpsc::Sender<Delivery>,
    pub(crate) lagged: Arc<AtomicBool>,
}

struct ConnectionEntry {
    tx: mpsc::Sender<Delivery>,
    lagged: Arc<AtomicBool>,
    topics: HashSet<Topic>,
}

/// Topic -> subscriber set, safe for concurrent subscribe/unsubscribe/publish
#[derive(Default)]
pub struct SubscriptionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    topics: RwLock<HashMap<Topic, HashSet<ConnectionId>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new connection with an outbound queue of `capacity`
    pub fn connect(self: &Arc<Self>, capacity: usize) -> (ConnectionGuard, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = ConnectionId::next();
        let lagged = Arc::new(AtomicBool::new(false));
        self.connections.write().insert(
            id,
            ConnectionEntry {
                tx,
                lagged: Arc::clone(&lagged),
                topics: HashSet::new(),
            },
        );
        tracing::debug!(connection = %id, "connection registered");

        let guard = ConnectionGuard {
            id,
            lagged,
            registry: Arc::downgrade(self),
        };
        (guard, rx)
    }

    pub fn subscribe(&self, connection: ConnectionId, topic: Topic) -> SyncResult<Outcome> {
        let mut connections = self.connections.write();
        let entry = connections
            .get_mut(&connection)
            .ok_or(SyncError::UnknownConnection(connection))?;
        if !entry.topics.insert(topic.clone()) {
            return Ok(Outcome::AlreadyProcessed);
        }
        self.topics.write().entry(topic.clone()).or_default().insert(connection);
        tracing::debug!(connection = %connection, topic = %topic, "subscribed");
        Ok(Outcome::Applied)
    }

    pub fn unsubscribe(&self, connection: ConnectionId, topic: &Topic) -> Outcome {
        let mut connections = self.connections.write();
        let removed = connections
            .get_mut(&connection)
            .map(|entry| entry.topics.remove(topic))
            .unwrap_or(false);
        if !removed {
            return Outcome::AlreadyProcessed;
        }
        Self::detach(&mut self.topics.write(), connection, topic);
        tracing::debug!(connection = %connection, topic = %topic, "unsubscribed");
        Outcome::Applied
    }

    fn detach(topics: &mut HashMap<Topic, HashSet<ConnectionId>>, connection: ConnectionId, topic: &Topic) {
        if let Some(members) = topics.get_mut(topic) {
            members.remove(&connection);
            if members.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Drop a connection and all of its subscriptions.
    /// Returns the number of subscriptions removed.
    pub fn disconnect(&self, connection: ConnectionId) -> usize {
        let mut connections = self.connections.write();
        let Some(entry) = connections.remove(&connection) else {
            return 0;
        };
        let mut topics = self.topics.write();
        for topic in &entry.topics {
            Self::detach(&mut topics, connection, topic);
        }
        entry.topics.len()
    }

    pub fn subscribers_of(&self, topic: &Topic) -> HashSet<ConnectionId> {
        self.topics.read().get(topic).cloned().unwrap_or_default()
    }

    /// Outbound handles of every subscriber of `topic`
    pub(crate) fn recipients(&self, topic: &Topic) -> Vec<Subscriber> {
        let connections = self.connections.read();
        let topics = self.topics.read();
        let Some(members) = topics.get(topic) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| {
                connections.get(id).map(|entry| Subscriber {
                    id: *id,
                    tx: entry.tx.clone(),
                    lagged: Arc::clone(&entry.lagged),
                })
            })
            .collect()
    }

    pub fn topics_of(&self, connection: ConnectionId) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .connections
            .read()
            .get(&connection)
            .map(|entry| entry.topics.iter().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    pub fn is_connected(&self, connection: ConnectionId) -> bool {
        self.connections.read().contains_key(&connection)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }
}

/// Live registration of one connection. Dropping it unsubscribes everything.
pub struct ConnectionGuard {
    id: ConnectionId,
    lagged: Arc<AtomicBool>,
    registry: Weak<SubscriptionRegistry>,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn subscribe(&self, topic: Topic) -> SyncResult<Outcome> {
        match self.registry.upgrade() {
            Some(registry) => registry.subscribe(self.id, topic),
            None => Err(SyncError::UnknownConnection(self.id)),
        }
    }

    pub fn unsubscribe(&self, topic: &Topic) -> Outcome {
        self.registry
            .upgrade()
            .map(|registry| registry.unsubscribe(self.id, topic))
            .unwrap_or(Outcome::AlreadyProcessed)
    }

    /// Whether deliveries were dropped since the last call
    pub fn take_lagged(&self) -> bool {
        self.lagged.swap(false, Ordering::AcqRel)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let removed = registry.disconnect(self.id);
            tracing::debug!(connection = %self.id, subscriptions = removed, "connection released");
        }
    }
}
