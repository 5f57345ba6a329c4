//! Async Effects
//!
//! An effect is an async function declared on a slice, typically fetching
//! something and dispatching the result. While one runs, the store's
//! loading slice holds `true` at `<key>.<name>`, so consumers can track
//! "is this loading" like any other path:
//!
//! ```rust,ignore
//! let fetch = slice.effect("fetch", |cx, id| Box::pin(async move {
//!     let user = api::user(id).await.map_err(|e| Error::Effect(e.to_string()))?;
//!     cx.dispatch("loaded", user)
//! }));
//! fetch.run(None, 7).await?;
//! ```
//!
//! The flag is cleared whether the effect succeeds or fails.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::state::{path, Value};
use crate::store::{Action, SliceHandle, Store, SET_STATE};

/// The async body of an effect.
pub type EffectFn = dyn Fn(EffectContext, Value) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// What a running effect can reach.
#[derive(Clone)]
pub struct EffectContext {
    store: Store,
    key: String,
}

impl EffectContext {
    /// Slice key the effect was run for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Dispatch a mutation on the effect's own slice key.
    pub fn dispatch(&self, mutation: &str, payload: impl Into<Value>) -> Result<()> {
        self.store
            .dispatch(Action::for_slice(&self.key, mutation).with_payload(payload))
    }

    /// Committed state of the effect's slice key.
    pub fn state(&self) -> Option<Value> {
        self.store.slice_state(&self.key)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl fmt::Debug for EffectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectContext").field("key", &self.key).finish()
    }
}

/// A named effect of one slice.
#[derive(Clone)]
pub struct EffectHandle {
    slice: SliceHandle,
    name: Arc<str>,
    f: Arc<EffectFn>,
}

impl EffectHandle {
    pub(crate) fn new<F>(slice: SliceHandle, name: &str, f: F) -> Self
    where
        F: Fn(EffectContext, Value) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self {
            slice,
            name: name.into(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this effect is running for instance `id`.
    pub fn is_loading(&self, id: Option<&str>) -> bool {
        self.slice.store().is_loading(&self.slice.key(id), &self.name)
    }

    /// Run the effect for instance `id` and wait for it.
    pub async fn run(&self, id: Option<&str>, payload: impl Into<Value>) -> Result<()> {
        let key = self.slice.key(id);
        let store = self.slice.store().clone();
        let flag = path::join(&key, &self.name);

        set_loading(&store, &flag, true)?;
        debug!(key = %key, effect = %self.name, "effect started");
        let context = EffectContext {
            store: store.clone(),
            key,
        };
        let result = (self.f)(context, payload.into()).await;

        if let Err(err) = set_loading(&store, &flag, false) {
            warn!(effect = %self.name, error = %err, "could not clear loading flag");
        }
        debug!(effect = %self.name, ok = result.is_ok(), "effect finished");
        result
    }

    /// Run the effect on the current Tokio runtime without waiting.
    /// Failures are logged.
    pub fn spawn(&self, id: Option<&str>, payload: impl Into<Value>) -> Result<JoinHandle<()>> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let this = self.clone();
        let id = id.map(str::to_string);
        let payload = payload.into();
        Ok(runtime.spawn(async move {
            if let Err(err) = this.run(id.as_deref(), payload).await {
                warn!(effect = %this.name, error = %err, "effect failed");
            }
        }))
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("slice", &self.slice.namespace())
            .field("name", &self.name)
            .finish()
    }
}

fn set_loading(store: &Store, flag: &str, loading: bool) -> Result<()> {
    let namespace = &store.config().loading_namespace;
    let payload = Value::from(vec![Value::from(flag), Value::from(loading)]);
    store.dispatch(Action::for_slice(namespace, SET_STATE).with_payload(payload))
}
