//! Selective Subscription
//!
//! Consumers never subscribe to the store themselves. The
//! [`SubscriptionManager`] holds one store subscription on behalf of all of
//! them and, on every committed change, re-checks each consumer's tracked
//! paths against the slice state it last saw. Only consumers whose paths
//! resolve to a different value are called back.
//!
//! The shared subscription is taken when the first consumer attaches and
//! released when the last one detaches.
//!
//! A consumer whose slice is not mounted is skipped: no change, no
//! callback. Its snapshot is kept, so if the key is mounted again with
//! fresh state the tracked paths differ and the consumer hears about it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::subscriber::{Subscriber, SubscriberId};
use super::tracking::{has_changed, SharedDeps};
use crate::state::Value;
use crate::store::{Store, Subscription, WeakStore};

/// One attached consumer.
struct Watch {
    subscriber: Subscriber,
    key: String,
    deps: SharedDeps,
    snapshot: Mutex<Option<Value>>,
    active: AtomicBool,
}

impl Watch {
    /// Compare against `current` and move the snapshot forward.
    fn check(&self, current: Value) -> bool {
        let deps = self.deps.lock();
        let mut snapshot = self.snapshot.lock();
        let changed = has_changed(snapshot.as_ref(), Some(&current), &deps);
        *snapshot = Some(current);
        changed
    }
}

#[derive(Default)]
struct Shared {
    watches: Vec<Arc<Watch>>,
    subscription: Option<Subscription>,
}

/// Fans one store subscription out to many path-tracking consumers.
pub struct SubscriptionManager {
    store: WeakStore,
    shared: Mutex<Shared>,
}

impl SubscriptionManager {
    pub(crate) fn new(store: WeakStore) -> Self {
        Self {
            store,
            shared: Mutex::new(Shared::default()),
        }
    }

    /// Watch the paths in `deps` under slice `key`.
    ///
    /// The snapshot starts at the slice's current state. `on_change` runs
    /// after a committed change touches a recorded path.
    pub fn attach<F>(&self, key: impl Into<String>, deps: SharedDeps, on_change: F) -> Detach
    where
        F: Fn() + Send + Sync + 'static,
    {
        let key = key.into();
        let store = self.store.upgrade();
        let watch = Arc::new(Watch {
            subscriber: Subscriber::new(on_change),
            snapshot: Mutex::new(store.as_ref().and_then(|s| s.slice_state(&key))),
            key,
            deps,
            active: AtomicBool::new(true),
        });

        let mut shared = self.shared.lock();
        shared.watches.push(Arc::clone(&watch));
        if shared.subscription.is_none() {
            if let Some(store) = &store {
                let weak = store.downgrade();
                shared.subscription = Some(store.subscribe(move || {
                    if let Some(store) = weak.upgrade() {
                        store.subscriptions().notify(&store);
                    }
                }));
            }
        }
        trace!(id = ?watch.subscriber.id(), key = %watch.key, "consumer attached");

        Detach {
            watch,
            store: self.store.clone(),
        }
    }

    /// Number of attached consumers.
    pub fn len(&self) -> usize {
        self.shared.lock().watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the shared store subscription is currently held.
    pub fn is_subscribed(&self) -> bool {
        self.shared.lock().subscription.is_some()
    }

    fn notify(&self, store: &Store) {
        let snapshot: Vec<Arc<Watch>> = self.shared.lock().watches.clone();
        for watch in snapshot {
            if !watch.active.load(Ordering::Acquire) {
                continue;
            }
            let Some(current) = store.slice_state(&watch.key) else {
                continue;
            };
            if watch.check(current) {
                trace!(id = ?watch.subscriber.id(), key = %watch.key, "tracked path changed");
                watch.subscriber.notify();
            }
        }
    }

    fn detach(&self, id: SubscriberId) {
        // Dropped after the lock is released; dropping unsubscribes.
        let released = {
            let mut shared = self.shared.lock();
            shared.watches.retain(|w| w.subscriber.id() != id);
            if shared.watches.is_empty() {
                shared.subscription.take()
            } else {
                None
            }
        };
        drop(released);
    }
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("SubscriptionManager")
            .field("consumers", &shared.watches.len())
            .field("subscribed", &shared.subscription.is_some())
            .finish()
    }
}

/// Handle to an attached consumer. Detaches on drop.
#[must_use = "dropping a Detach handle detaches the consumer"]
pub struct Detach {
    watch: Arc<Watch>,
    store: WeakStore,
}

impl Detach {
    pub fn id(&self) -> SubscriberId {
        self.watch.subscriber.id()
    }

    pub fn key(&self) -> &str {
        &self.watch.key
    }

    pub fn is_attached(&self) -> bool {
        self.watch.active.load(Ordering::Acquire)
    }

    /// Reset the snapshot the next comparison starts from.
    pub(crate) fn rebase(&self, state: Option<Value>) {
        *self.watch.snapshot.lock() = state;
    }

    /// Stop watching. Safe to call more than once, and from inside the
    /// consumer's own callback.
    pub fn detach(&self) {
        if !self.watch.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.subscriptions().detach(self.id());
        }
        trace!(id = ?self.id(), "consumer detached");
    }
}

impl Drop for Detach {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Detach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detach")
            .field("id", &self.id())
            .field("key", &self.watch.key)
            .field("attached", &self.is_attached())
            .finish()
    }
}
