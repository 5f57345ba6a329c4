//! Slice Registry
//!
//! The registry owns the mapping from slice key to generated reducer and
//! counts how many mounts hold each key. It decides *whether* the root
//! reducer has to be rebuilt; the store does the rebuilding.
//!
//! # Lifecycle
//!
//! - The first mount of a key installs its reducer.
//! - Further mounts of the same key only bump the count, so accumulated
//!   state survives a remount.
//! - When the last mount goes away the reducer is removed. The next root
//!   reduction drops the key's state entirely.

use std::sync::Arc;

use indexmap::IndexMap;

use super::action::Action;
use super::reducer::{Reducer, SliceReducer};
use crate::error::Result;
use crate::state::{Map, Value};

#[derive(Debug, Clone)]
struct SliceEntry {
    reducer: Arc<SliceReducer>,
    mounts: usize,
}

/// Registered slices by key.
#[derive(Debug, Default, Clone)]
pub struct SliceRegistry {
    slices: IndexMap<String, SliceEntry>,
}

impl SliceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a mount of `key`, installing the reducer from `make` if this is
    /// the first one. Returns `true` when a reducer was installed.
    pub fn mount<F>(&mut self, key: &str, make: F) -> bool
    where
        F: FnOnce() -> SliceReducer,
    {
        if let Some(entry) = self.slices.get_mut(key) {
            entry.mounts += 1;
            return false;
        }
        self.slices.insert(
            key.to_string(),
            SliceEntry {
                reducer: Arc::new(make()),
                mounts: 1,
            },
        );
        true
    }

    /// Release one mount of `key`. Returns `true` when that was the last
    /// one and the reducer was removed. Unknown keys are ignored.
    pub fn unmount(&mut self, key: &str) -> bool {
        let Some(entry) = self.slices.get_mut(key) else {
            return false;
        };
        entry.mounts = entry.mounts.saturating_sub(1);
        if entry.mounts > 0 {
            return false;
        }
        self.slices.shift_remove(key);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slices.contains_key(key)
    }

    /// Number of mounts currently holding `key`.
    pub fn mount_count(&self, key: &str) -> usize {
        self.slices.get(key).map_or(0, |e| e.mounts)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Snapshot the current reducers for building a root reducer.
    pub(crate) fn reducers(&self) -> IndexMap<String, Arc<SliceReducer>> {
        self.slices
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(&e.reducer)))
            .collect()
    }
}

/// The composed reducer: every slice reducer over its own key, then the seed.
pub(crate) struct RootReducer {
    slices: IndexMap<String, Arc<SliceReducer>>,
    seed: Arc<dyn Reducer>,
}

impl RootReducer {
    pub(crate) fn new(slices: IndexMap<String, Arc<SliceReducer>>, seed: Arc<dyn Reducer>) -> Self {
        Self { slices, seed }
    }

    /// Combine slice states. Keys without a reducer are dropped. If every
    /// slice returned its previous value the root itself is returned.
    fn combine(&self, root: &Value, action: &Action) -> Result<Value> {
        let prev = root.as_object();
        let mut changed = prev.map_or(true, |m| m.len() != self.slices.len());
        let mut next = Map::with_capacity(self.slices.len());

        for (key, reducer) in &self.slices {
            let before = prev.and_then(|m| m.get(key));
            let after = reducer.reduce(before, action)?;
            changed |= !Value::same_opt(before, Some(&after));
            next.insert(key.clone(), after);
        }

        Ok(if changed { Value::from(next) } else { root.clone() })
    }
}

impl Reducer for RootReducer {
    fn reduce(&self, state: Option<&Value>, action: &Action) -> Result<Value> {
        let root = state.cloned().unwrap_or_else(Value::object);
        let combined = self.combine(&root, action)?;
        self.seed.reduce(Some(&combined), action)
    }
}
