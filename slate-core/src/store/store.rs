//! The Store
//!
//! One store per application root. It exclusively owns:
//!
//! - the committed root state, an object from slice key to slice state
//! - the slice registry and the root reducer composed from it
//! - the list of store subscribers
//!
//! # Dispatch
//!
//! Dispatch is synchronous: reduce, commit, notify, then return. Reduction
//! happens under a reentrant dispatch lock, so dispatches from other threads
//! queue up while a mutation that tries to dispatch on the same thread is
//! rejected with [`Error::ReducerDispatch`] instead of deadlocking.
//! Subscribers are called after the lock is released, from a snapshot of the
//! subscriber list, so they may dispatch, subscribe, unsubscribe, mount or
//! unmount freely.
//!
//! A dispatch whose root reducer returns the same root (nothing changed)
//! commits nothing and notifies nobody.

use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, trace, warn};

use super::action::{slice_key, Action};
use super::reducer::{IdentityReducer, MutationMap, Reducer, SliceReducer};
use super::registry::{RootReducer, SliceRegistry};
use super::slice::{SliceHandle, SliceOptions};
use crate::config::StoreConfig;
use crate::dispatch::{CallSiteId, DispatchController};
use crate::error::{Error, Result};
use crate::reactive::{Subscriber, SubscriberId, SubscriptionManager};
use crate::state::{path, Value};

/// Action dispatched whenever the root reducer is rebuilt.
pub const REPLACE: &str = "@@slate/REPLACE";

pub(crate) struct StoreInner {
    config: StoreConfig,
    seed: Arc<dyn Reducer>,
    state: RwLock<Value>,
    registry: RwLock<SliceRegistry>,
    root: RwLock<Arc<RootReducer>>,
    subscribers: RwLock<Vec<Subscriber>>,
    dispatching: ReentrantMutex<Cell<bool>>,
    /// Keys unmounted while a reduction was running.
    stale: Mutex<Vec<String>>,
    subscriptions: SubscriptionManager,
    controller: DispatchController,
    site: CallSiteId,
}

/// Handle to a store. Clones share the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning store handle held by timers, subscriptions and the store's
/// own components.
#[derive(Clone)]
pub struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

impl fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakStore").field(&self.0.strong_count()).finish()
    }
}

/// Create a store whose root reducer is `seed` composed with the slices.
pub fn create_store<R: Reducer + 'static>(seed: R) -> Store {
    Store::new(seed)
}

/// Clears the dispatching flag even if a reducer panics.
struct DispatchFlag<'a>(&'a Cell<bool>);

impl<'a> DispatchFlag<'a> {
    fn raise(cell: &'a Cell<bool>) -> Self {
        cell.set(true);
        Self(cell)
    }
}

impl Drop for DispatchFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Store {
    pub fn new<R: Reducer + 'static>(seed: R) -> Self {
        Self::with_config(seed, StoreConfig::default())
    }

    pub fn with_config<R: Reducer + 'static>(seed: R, config: StoreConfig) -> Self {
        let seed: Arc<dyn Reducer> = Arc::new(seed);
        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| StoreInner {
            root: RwLock::new(Arc::new(RootReducer::new(Default::default(), Arc::clone(&seed)))),
            seed,
            state: RwLock::new(Value::object()),
            registry: RwLock::new(SliceRegistry::new()),
            subscribers: RwLock::new(Vec::new()),
            dispatching: ReentrantMutex::new(Cell::new(false)),
            stale: Mutex::new(Vec::new()),
            subscriptions: SubscriptionManager::new(WeakStore(weak.clone())),
            controller: DispatchController::new(WeakStore(weak.clone())),
            site: CallSiteId::new(),
            config,
        });
        let store = Store { inner };

        let loading = store.inner.config.loading_namespace.clone();
        let reducer = SliceReducer::new(loading.clone(), Value::object(), Arc::new(MutationMap::new()));
        if let Err(err) = store.mount_key(&loading, || reducer) {
            warn!(error = %err, "failed to mount loading slice");
        }
        store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    /// The committed root state.
    pub fn state(&self) -> Value {
        self.inner.state.read().clone()
    }

    /// Committed state of a mounted slice key; `None` if it is not mounted.
    pub fn slice_state(&self, key: &str) -> Option<Value> {
        if !self.is_mounted(key) {
            return None;
        }
        self.inner.state.read().child(key).cloned()
    }

    pub fn is_mounted(&self, key: &str) -> bool {
        self.inner.registry.read().contains(key)
    }

    /// How many mount handles currently hold `key`.
    pub fn mount_count(&self, key: &str) -> usize {
        self.inner.registry.read().mount_count(key)
    }

    /// Keys of every mounted slice, in mount order.
    pub fn mounted_keys(&self) -> Vec<String> {
        self.inner.registry.read().keys().map(str::to_string).collect()
    }

    /// Whether the effect `name` of slice `key` is running.
    pub fn is_loading(&self, key: &str, name: &str) -> bool {
        self.slice_state(&self.inner.config.loading_namespace)
            .and_then(|s| path::resolve(&s, &path::join(key, name)).and_then(Value::as_bool))
            .unwrap_or(false)
    }

    /// Dispatch an action.
    ///
    /// Undecorated actions are reduced and committed before this returns.
    /// Actions with timing metadata go through the dispatch controller with
    /// the store's own call site.
    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.inner.controller.submit(self.inner.site, action)
    }

    /// Register a callback run after every committed change.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let subscriber = Subscriber::new(f);
        let id = subscriber.id();
        self.inner.subscribers.write().push(subscriber);
        Subscription {
            id,
            store: self.downgrade(),
        }
    }

    /// Declare a slice. Nothing is registered until it is mounted.
    pub fn create_slice(&self, options: SliceOptions) -> SliceHandle {
        SliceHandle::new(self.clone(), options)
    }

    /// Shared subscription manager for slice consumers.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.inner.subscriptions
    }

    pub fn controller(&self) -> &DispatchController {
        &self.inner.controller
    }

    /// Reduce and commit `action` right now, bypassing timing metadata.
    pub(crate) fn dispatch_now(&self, action: &Action) -> Result<()> {
        let changed = {
            let guard = self.inner.dispatching.lock();
            if guard.get() {
                return Err(Error::ReducerDispatch);
            }
            let _flag = DispatchFlag::raise(&guard);
            trace!(action = %action.kind, "dispatch");
            self.commit(action, None)?
        };

        if changed {
            self.notify();
        }
        Ok(())
    }

    /// Reduce `action` over the committed root with `purge` removed first,
    /// then drop any key unmounted during the reduction, and commit.
    /// The caller holds the dispatch lock with its flag raised.
    fn commit(&self, action: &Action, purge: Option<&str>) -> Result<bool> {
        let root = Arc::clone(&*self.inner.root.read());
        let prev = self.inner.state.read().clone();
        let base = match purge {
            Some(key) => without(&prev, key),
            None => prev.clone(),
        };

        let mut next = root.reduce(Some(&base), action)?;
        let stale: Vec<String> = self.inner.stale.lock().drain(..).collect();
        if !stale.is_empty() {
            let registry = self.inner.registry.read();
            for key in stale.iter().filter(|k| !registry.contains(k)) {
                next = without(&next, key);
            }
        }

        if Value::same(&prev, &next) {
            return Ok(false);
        }
        *self.inner.state.write() = next;
        Ok(true)
    }

    fn notify(&self) {
        let snapshot: Vec<Subscriber> = self.inner.subscribers.read().clone();
        trace!(subscribers = snapshot.len(), "notify");
        for subscriber in &snapshot {
            subscriber.notify();
        }
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.inner.subscribers.write().retain(|s| s.id() != id);
    }

    /// Rebuild the root reducer from the registry. Called with the registry
    /// lock held so concurrent mounts cannot install a stale root.
    fn recompose(&self, registry: &SliceRegistry) {
        let root = RootReducer::new(registry.reducers(), Arc::clone(&self.inner.seed));
        *self.inner.root.write() = Arc::new(root);
        debug!(slices = registry.len(), "recomposed root reducer");
    }

    /// Count a mount of `key`, installing and initialising it if it is new.
    ///
    /// Installing happens under the dispatch lock, and the first reduction
    /// of the new key starts from a root without it, so leftovers of an
    /// earlier mount can never seed the fresh reducer.
    pub(crate) fn mount_key<F>(&self, key: &str, make: F) -> Result<()>
    where
        F: FnOnce() -> SliceReducer,
    {
        let guard = self.inner.dispatching.lock();
        {
            let mut registry = self.inner.registry.write();
            if registry.contains(key) {
                registry.mount(key, make);
                trace!(key, "slice already mounted");
                return Ok(());
            }
            if guard.get() {
                return Err(Error::ReducerDispatch);
            }
            registry.mount(key, make);
            self.recompose(&registry);
        }

        let flag = DispatchFlag::raise(&guard);
        let changed = match self.commit(&Action::new(REPLACE), Some(key)) {
            Ok(changed) => changed,
            Err(err) => {
                let mut registry = self.inner.registry.write();
                registry.unmount(key);
                self.recompose(&registry);
                return Err(err);
            }
        };
        drop(flag);
        drop(guard);

        debug!(key, "slice mounted");
        if changed {
            self.notify();
        }
        Ok(())
    }

    /// Release a mount of `key`; the last release deletes its state.
    pub(crate) fn unmount_key(&self, key: &str) {
        let guard = self.inner.dispatching.lock();
        {
            let mut registry = self.inner.registry.write();
            if !registry.unmount(key) {
                return;
            }
            self.recompose(&registry);
        }
        debug!(key, "slice unmounted");

        if guard.get() {
            // Unmounted from inside a reduction: that reduction's commit
            // drops the key.
            self.inner.stale.lock().push(key.to_string());
            return;
        }

        let flag = DispatchFlag::raise(&guard);
        let changed = match self.commit(&Action::new(REPLACE), Some(key)) {
            Ok(changed) => changed,
            Err(err) => {
                warn!(key, error = %err, "reducers failed while dropping slice, removing its state directly");
                self.purge(key)
            }
        };
        drop(flag);
        drop(guard);

        if changed {
            self.notify();
        }
    }

    /// Remove `key` from the committed root without running any reducer.
    fn purge(&self, key: &str) -> bool {
        let mut state = self.inner.state.write();
        let next = without(&state, key);
        if Value::same(&state, &next) {
            return false;
        }
        *state = next;
        true
    }

    /// Key for `namespace` plus optional id.
    pub fn key(namespace: &str, id: Option<&str>) -> String {
        slice_key(namespace, id)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(IdentityReducer)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("slices", &self.mounted_keys())
            .field("subscribers", &self.inner.subscribers.read().len())
            .finish()
    }
}

/// `root` without the top-level entry `key`. Keys may contain the path
/// separator, so this does not go through [`path`].
fn without(root: &Value, key: &str) -> Value {
    match root.as_object() {
        Some(map) if map.contains_key(key) => {
            let mut map = map.clone();
            map.shift_remove(key);
            Value::from(map)
        }
        _ => root.clone(),
    }
}

/// A store subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    store: WeakStore,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop receiving notifications. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
