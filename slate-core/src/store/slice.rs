//! Slices
//!
//! A [`SliceHandle`] is a declared slice: namespace, initial state, and
//! mutations. Declaring registers nothing. Each [`mount`](SliceHandle::mount)
//! under an optional instance id returns a [`MountHandle`]; the key stays
//! registered while at least one mount handle for it is alive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use super::action::{slice_key, Action};
use super::reducer::{Mutation, MutationMap, SliceReducer};
use super::store::Store;
use crate::dispatch::{ActionDispatcher, CallSiteId, DispatchMeta, SiteSet};
use crate::effect::{EffectContext, EffectHandle};
use crate::error::Result;
use crate::reactive::{track, Consumer, DepSet, TrackingView};
use crate::state::{Draft, Value};

/// Declaration of a slice.
pub struct SliceOptions {
    namespace: String,
    initial: Value,
    mutations: MutationMap,
}

impl SliceOptions {
    pub fn new(namespace: impl Into<String>, initial: impl Into<Value>) -> Self {
        Self {
            namespace: namespace.into(),
            initial: initial.into(),
            mutations: MutationMap::new(),
        }
    }

    /// Add a named mutation. Registering a name twice keeps the last one.
    pub fn mutation<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Draft, &Action) -> Result<()> + Send + Sync + 'static,
    {
        let mutation: Mutation = Arc::new(f);
        self.mutations.insert(name.into(), mutation);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Debug for SliceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceOptions")
            .field("namespace", &self.namespace)
            .field("initial", &self.initial)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A declared slice bound to a store.
#[derive(Clone)]
pub struct SliceHandle {
    store: Store,
    namespace: Arc<str>,
    initial: Value,
    mutations: Arc<MutationMap>,
    site: CallSiteId,
}

impl SliceHandle {
    pub(crate) fn new(store: Store, options: SliceOptions) -> Self {
        Self {
            store,
            namespace: options.namespace.into(),
            initial: options.initial,
            mutations: Arc::new(options.mutations),
            site: CallSiteId::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Store key for the given instance id.
    pub fn key(&self, id: Option<&str>) -> String {
        slice_key(&self.namespace, id)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Mount an instance. The first mount of a key installs the reducer and
    /// initial state; later mounts share what has accumulated since.
    pub fn mount(&self, id: Option<&str>) -> Result<MountHandle> {
        let key = self.key(id);
        self.store.mount_key(&key, || {
            SliceReducer::new(key.clone(), self.initial.clone(), Arc::clone(&self.mutations))
        })?;
        Ok(MountHandle {
            store: self.store.clone(),
            key,
            site: CallSiteId::new(),
            sites: SiteSet::default(),
            mounted: AtomicBool::new(true),
        })
    }

    /// A one-off tracking view over the instance's committed state. Reads
    /// are recorded into a dependency set owned by the view.
    pub fn read(&self, id: Option<&str>) -> TrackingView {
        let deps = Arc::new(Mutex::new(DepSet::new()));
        track(self.store.slice_state(&self.key(id)), deps)
    }

    /// Committed state of the instance, untracked.
    pub fn get_state(&self, id: Option<&str>) -> Option<Value> {
        self.store.slice_state(&self.key(id))
    }

    /// Dispatch `mutation` to the namespace's default instance.
    pub fn dispatch(&self, mutation: &str, payload: impl Into<Value>, meta: Option<DispatchMeta>) -> Result<()> {
        let action = Action::for_slice(&self.namespace, mutation)
            .with_payload(payload)
            .with_meta(meta);
        self.store.controller().submit(self.site, action)
    }

    /// A consumer of the instance that is called back when a path it read
    /// during its latest pass changes.
    pub fn consumer<F>(&self, id: Option<&str>, on_change: F) -> Consumer
    where
        F: Fn() + Send + Sync + 'static,
    {
        Consumer::new(self.store.clone(), self.key(id), on_change)
    }

    /// A dispatcher with its own call site for `mutation` on the default
    /// instance.
    pub fn action(&self, mutation: &str) -> ActionDispatcher {
        ActionDispatcher::new(self.store.clone(), self.namespace.to_string(), mutation)
    }

    /// Declare an async effect. While it runs, the loading flag
    /// `(key, name)` is set.
    pub fn effect<F>(&self, name: &str, f: F) -> EffectHandle
    where
        F: Fn(EffectContext, Value) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        EffectHandle::new(self.clone(), name, f)
    }

    /// Cancel pending timed dispatches made through [`dispatch`](Self::dispatch).
    pub fn cancel(&self) {
        self.store.controller().cancel(self.site);
    }
}

impl fmt::Debug for SliceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceHandle")
            .field("namespace", &self.namespace)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One mount of a slice key. Dropping it unmounts.
#[must_use = "dropping a MountHandle unmounts the slice"]
pub struct MountHandle {
    store: Store,
    key: String,
    site: CallSiteId,
    sites: SiteSet,
    mounted: AtomicBool,
}

impl MountHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Dispatch `mutation` to this mount's key.
    pub fn dispatch(&self, mutation: &str, payload: impl Into<Value>, meta: Option<DispatchMeta>) -> Result<()> {
        let action = Action::for_slice(&self.key, mutation)
            .with_payload(payload)
            .with_meta(meta);
        self.store.controller().submit(self.site, action)
    }

    /// A dispatcher for `mutation` on this mount's key. Its pending timers
    /// are cancelled when this handle unmounts.
    pub fn action(&self, mutation: &str) -> ActionDispatcher {
        ActionDispatcher::new(self.store.clone(), self.key.clone(), mutation).owned_by(self.sites.clone())
    }

    /// Call sites of dispatchers from [`action`](Self::action) still alive.
    pub fn live_sites(&self) -> usize {
        self.sites.lock().len()
    }

    /// Release this mount and cancel its call sites. Idempotent.
    pub fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::AcqRel) {
            return;
        }
        let controller = self.store.controller();
        controller.cancel(self.site);
        let sites: Vec<CallSiteId> = self.sites.lock().drain(..).collect();
        for site in sites {
            controller.cancel(site);
        }
        self.store.unmount_key(&self.key);
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle")
            .field("key", &self.key)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
