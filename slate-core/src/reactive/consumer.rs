//! Consumers: the read side of a slice, one per rendering subtree.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::subscription::Detach;
use super::tracking::{track, DepSet, SharedDeps, TrackingView};
use crate::store::Store;

/// Owns one dependency set and the subscription that watches it.
///
/// Call [`track`](Self::track) at the start of every render pass and read
/// through the returned view. The callback given at creation runs whenever
/// a committed change touches something the most recent pass read.
pub struct Consumer {
    store: Store,
    key: String,
    deps: SharedDeps,
    handle: Detach,
}

impl Consumer {
    pub(crate) fn new<F>(store: Store, key: String, on_change: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let deps: SharedDeps = Arc::new(Mutex::new(DepSet::new()));
        let handle = store.subscriptions().attach(key.clone(), Arc::clone(&deps), on_change);
        Self {
            store,
            key,
            deps,
            handle,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Begin a fresh pass: forget the previous reads and snapshot the
    /// current slice state as the baseline for the next comparison.
    pub fn track(&self) -> TrackingView {
        self.deps.lock().clear();
        let state = self.store.slice_state(&self.key);
        self.handle.rebase(state.clone());
        track(state, Arc::clone(&self.deps))
    }

    /// Paths recorded since the last [`track`](Self::track).
    pub fn deps(&self) -> DepSet {
        self.deps.lock().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_attached()
    }

    /// Stop receiving change callbacks.
    pub fn detach(&self) {
        self.handle.detach();
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.key)
            .field("deps", &*self.deps.lock())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::state::Draft;
    use crate::store::{Action, SliceOptions, Store};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn retracking_replaces_dependencies() {
        let store = Store::default();
        let slice = store.create_slice(
            SliceOptions::new("form", json!({ "name": "", "age": 0 }))
                .mutation("setName", |draft: &mut Draft, action: &Action| {
                    draft.set("name", action.payload.clone())
                })
                .mutation("setAge", |draft: &mut Draft, action: &Action| {
                    draft.set("age", action.payload.clone())
                }),
        );
        let _mount = slice.mount(None).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let consumer = slice.consumer(None, move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        consumer.track().get("name").as_str();
        assert!(consumer.deps().contains("name"));

        slice.dispatch("setAge", 3, None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Second pass reads only age.
        consumer.track().get("age").as_i64();
        assert!(!consumer.deps().contains("name"));

        slice.dispatch("setName", "Ann", None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        slice.dispatch("setAge", 4, None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        consumer.detach();
        slice.dispatch("setAge", 5, None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!consumer.is_attached());
    }
}
