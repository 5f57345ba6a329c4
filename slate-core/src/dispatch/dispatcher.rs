//! Action dispatchers: one call site bound to one mutation.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;

use super::meta::DispatchMeta;
use super::timer::CallSiteId;
use crate::error::Result;
use crate::state::Value;
use crate::store::{Action, Store};

/// Maps a caller's argument to the action payload.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Live call sites handed out by one owner.
pub(crate) type SiteSet = Arc<Mutex<IndexSet<CallSiteId>>>;

/// A call site dispatching one mutation of one slice key.
///
/// Each dispatcher has its own [`CallSiteId`], so its debounce and throttle
/// windows are independent of every other dispatcher. Dropping it cancels
/// whatever it still has pending.
pub struct ActionDispatcher {
    store: Store,
    key: String,
    mutation: String,
    site: CallSiteId,
    meta: Option<DispatchMeta>,
    transform: Option<Transform>,
    owner: Option<SiteSet>,
}

impl ActionDispatcher {
    pub(crate) fn new(store: Store, key: impl Into<String>, mutation: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            mutation: mutation.into(),
            site: CallSiteId::new(),
            meta: None,
            transform: None,
            owner: None,
        }
    }

    /// Register this call site in `sites` until the dispatcher is dropped.
    pub(crate) fn owned_by(mut self, sites: SiteSet) -> Self {
        sites.lock().insert(self.site);
        self.owner = Some(sites);
        self
    }

    /// Timing options applied to every [`dispatch`](Self::dispatch).
    pub fn with_meta(mut self, meta: DispatchMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Transform arguments into payloads before dispatching.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn site(&self) -> CallSiteId {
        self.site
    }

    /// The action type this dispatcher produces.
    pub fn action_type(&self) -> String {
        Action::for_slice(&self.key, &self.mutation).kind
    }

    /// Dispatch with the dispatcher's default timing options.
    pub fn dispatch(&self, payload: impl Into<Value>) -> Result<()> {
        self.dispatch_with(payload, self.meta.clone())
    }

    /// Dispatch with explicit timing options.
    pub fn dispatch_with(&self, payload: impl Into<Value>, meta: Option<DispatchMeta>) -> Result<()> {
        let mut payload = payload.into();
        if let Some(transform) = &self.transform {
            payload = transform(payload);
        }
        let action = Action::for_slice(&self.key, &self.mutation)
            .with_payload(payload)
            .with_meta(meta);
        self.store.controller().submit(self.site, action)
    }

    /// Cancel anything this call site has pending.
    pub fn cancel(&self) {
        self.store.controller().cancel(self.site);
    }
}

impl Drop for ActionDispatcher {
    fn drop(&mut self) {
        self.cancel();
        if let Some(owner) = &self.owner {
            owner.lock().shift_remove(&self.site);
        }
    }
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("key", &self.key)
            .field("mutation", &self.mutation)
            .field("site", &self.site)
            .field("meta", &self.meta)
            .finish()
    }
}
