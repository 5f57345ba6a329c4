//! Subscriber types for the store.
//!
//! A Subscriber is a callback the store runs after every committed change.
//! Consumers of individual slices sit behind one shared subscriber owned by
//! the [`SubscriptionManager`](super::SubscriptionManager).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
///
/// Store subscribers and slice consumers each get one when attached, and
/// detaching goes by ID so a subscriber can be removed while a notification
/// pass is iterating over a snapshot that still contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback notified when store state changes.
///
/// Cloning shares the callback, which is how a notification pass snapshots
/// the subscriber list without holding its lock while callbacks run.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Arc::new(notify),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Run the callback.
    pub fn notify(&self) {
        (self.notify)();
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn clones_share_the_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let subscriber = Subscriber::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        let copy = subscriber.clone();

        subscriber.notify();
        copy.notify();
        assert_eq!(copy.id(), subscriber.id());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
