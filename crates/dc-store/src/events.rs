//! Change notification for store subscribers

use dashmap::DashMap;
use std::fmt::{self, Display, Formatter};
use tokio::sync::mpsc;
use ulid::Ulid;

/// Subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub Ulid);

impl SubscriptionId {
    /// Create new subscription ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which part of the store changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Project summary list replaced or reconciled
    ProjectsChanged,
    /// Open project replaced, or its assets/history changed
    ProjectChanged,
    /// Canvas of the open project replaced
    CanvasChanged {
        /// New canvas checksum
        checksum: String,
    },
    /// Task table changed
    TasksChanged,
    /// Open project persisted; baseline moved to `checksum`
    Persisted {
        /// Persisted canvas checksum
        checksum: String,
    },
    /// Loading flag changed
    LoadingChanged(bool),
    /// Error banner set or cleared
    ErrorChanged,
}

/// A live subscription; events arrive in publish order
#[derive(Debug)]
pub struct Subscription {
    /// Id for [`ProjectStore::unsubscribe`](crate::ProjectStore::unsubscribe)
    pub id: SubscriptionId,
    /// Event stream
    pub events: mpsc::UnboundedReceiver<StoreEvent>,
}

#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: DashMap<SubscriptionId, mpsc::UnboundedSender<StoreEvent>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        self.senders.insert(id, tx);
        Subscription { id, events }
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.senders.remove(&id).is_some()
    }

    /// Deliver to every subscriber, pruning those whose receiver is gone
    pub(crate) fn publish(&self, event: &StoreEvent) {
        self.senders.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_live_subscribers_and_prunes_dropped() {
        let subscribers = Subscribers::default();
        let mut live = subscribers.subscribe();
        let dropped = subscribers.subscribe();
        drop(dropped);
        assert_eq!(subscribers.len(), 2);

        subscribers.publish(&StoreEvent::TasksChanged);
        assert_eq!(subscribers.len(), 1);
        assert_eq!(live.events.try_recv().unwrap(), StoreEvent::TasksChanged);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subscribers = Subscribers::default();
        let mut subscription = subscribers.subscribe();
        assert!(subscribers.unsubscribe(subscription.id));
        assert!(!subscribers.unsubscribe(subscription.id));

        subscribers.publish(&StoreEvent::ProjectsChanged);
        assert!(subscription.events.try_recv().is_err());
    }
}
