//! SubscriberRegistry - the live subscriber set

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::subscriber::Subscriber;

/// Registry-assigned subscriber identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// In-memory registry of connected subscribers
///
/// Readers only ever work on snapshots, so registration and removal never
/// race with an in-flight fan-out.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: Arc<RwLock<HashMap<SubscriberId, Arc<dyn Subscriber>>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, returning its id
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let peer = subscriber.peer().to_string();
        let count = {
            let mut guard = self.subscribers.write();
            guard.insert(id, subscriber);
            guard.len()
        };
        metrics::gauge!("gyro_relay_subscribers").set(count as f64);
        info!(subscriber = %id, peer = %peer, subscribers = count, "subscriber registered");
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut guard = self.subscribers.write();
            let removed = guard.remove(&id);
            (removed, guard.len())
        };
        match removed {
            Some(subscriber) => {
                metrics::gauge!("gyro_relay_subscribers").set(count as f64);
                info!(subscriber = %id, peer = subscriber.peer(), subscribers = count, "subscriber unregistered");
                true
            }
            None => false,
        }
    }

    /// Whether the id is currently registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Point-in-time copy of the set, ordered by registration
    pub fn snapshot(&self) -> Vec<(SubscriberId, Arc<dyn Subscriber>)> {
        let mut members: Vec<_> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, s)| (*id, Arc::clone(s)))
            .collect();
        members.sort_by_key(|(id, _)| *id);
        members
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Unregister and close every subscriber. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<_> = self.subscribers.write().drain().collect();
        metrics::gauge!("gyro_relay_subscribers").set(0.0);
        let count = drained.len();
        join_all(drained.iter().map(|(_, s)| s.close())).await;
        debug!(closed = count, "all subscribers closed");
        count
    }
}
