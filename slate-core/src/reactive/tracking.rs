//! Access Tracking
//!
//! A [`TrackingView`] is a read-only accessor over one slice's committed
//! state that writes down every path it is asked for. Reads compose: each
//! `get` returns a nested view over the child, created on demand, that
//! keeps recording into the same [`DepSet`] with its own path as prefix.
//!
//! # Recording Rules
//!
//! - `view.get("address")` records `address`
//! - `view.get("address").get("city")` records `address` and `address.city`
//! - reading a view's own value (`as_str`, `len`, `to_value`, ...) records
//!   that view's path, so reading the whole state records the empty path
//! - paths are a set: reading the same path twice records it once
//!
//! Views over missing slices or paths are empty leaves. They record what was
//! asked for and answer `None`, but never panic.
//!
//! # Change Detection
//!
//! [`has_changed`] resolves every recorded path in an old and a new state
//! and compares with [`Value::same`]. An empty dependency set never reports
//! a change: a consumer that read nothing depends on nothing.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::state::{path, Value};

/// Paths read during one tracking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepSet {
    paths: IndexSet<String>,
}

/// A dependency set shared between a consumer and the views it hands out.
pub type SharedDeps = Arc<Mutex<DepSet>>;

impl DepSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path. Returns `false` if it was already recorded.
    pub fn record(&mut self, path: impl Into<String>) -> bool {
        self.paths.insert(path.into())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

/// Whether any recorded path resolves to a different value in `new` than in `old`.
pub fn has_changed(old: Option<&Value>, new: Option<&Value>, deps: &DepSet) -> bool {
    deps.iter()
        .any(|p| !Value::same_opt(path::resolve_opt(old, p), path::resolve_opt(new, p)))
}

/// Start a tracking pass over `state`, recording into `deps`.
pub fn track(state: Option<Value>, deps: SharedDeps) -> TrackingView {
    TrackingView {
        value: state,
        path: String::new(),
        deps,
    }
}

/// Read-only view over part of a slice's state that records what it reads.
#[derive(Clone)]
pub struct TrackingView {
    value: Option<Value>,
    path: String,
    deps: SharedDeps,
}

impl TrackingView {
    /// Read a child by key or array index.
    pub fn get(&self, segment: &str) -> TrackingView {
        let path = path::join(&self.path, segment);
        self.deps.lock().record(path.clone());
        TrackingView {
            value: self.value.as_ref().and_then(|v| v.child(segment)).cloned(),
            path,
            deps: Arc::clone(&self.deps),
        }
    }

    /// Read a dotted path, one segment at a time.
    pub fn at(&self, dotted: &str) -> TrackingView {
        path::segments(dotted)
            .into_iter()
            .fold(self.clone(), |view, segment| view.get(segment))
    }

    /// Path of this view relative to the slice root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The dependency set this view records into.
    pub fn deps(&self) -> &SharedDeps {
        &self.deps
    }

    fn touch(&self) -> Option<&Value> {
        self.deps.lock().record(self.path.as_str());
        self.value.as_ref()
    }

    /// Borrow the value at this path.
    pub fn value(&self) -> Option<&Value> {
        self.touch()
    }

    /// Whether anything exists at this path.
    pub fn is_present(&self) -> bool {
        self.touch().is_some()
    }

    /// `true` for explicit nulls and for missing values.
    pub fn is_null(&self) -> bool {
        self.touch().map_or(true, Value::is_null)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.touch().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.touch().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.touch().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.touch().and_then(Value::as_bool)
    }

    /// Number of children of an object or array.
    pub fn len(&self) -> Option<usize> {
        self.touch().and_then(Value::len)
    }

    /// Keys of an object, in order.
    pub fn keys(&self) -> Vec<String> {
        self.touch()
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Views over each element of an array.
    pub fn items(&self) -> Vec<TrackingView> {
        let len = self.touch().and_then(Value::as_array).map_or(0, <[Value]>::len);
        (0..len).map(|i| self.get(&i.to_string())).collect()
    }

    /// The value itself. Recording the path means any change below it counts.
    pub fn to_value(&self) -> Option<Value> {
        self.touch().cloned()
    }
}

impl fmt::Debug for TrackingView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingView")
            .field("path", &self.path)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Draft;
    use serde_json::json;

    fn state() -> Value {
        Value::from(json!({
            "name": "Alice",
            "address": { "city": "Oslo", "zip": "0150" },
            "tags": ["a", "b"],
            "x": { "y": 1 }
        }))
    }

    fn fresh(value: Option<Value>) -> TrackingView {
        track(value, Arc::new(Mutex::new(DepSet::new())))
    }

    fn recorded(view: &TrackingView) -> Vec<String> {
        view.deps().lock().iter().map(str::to_string).collect()
    }

    #[test]
    fn nested_reads_record_every_prefix() {
        let view = fresh(Some(state()));
        assert_eq!(view.get("address").get("city").as_str(), Some("Oslo"));
        assert_eq!(recorded(&view), vec!["address", "address.city"]);
    }

    #[test]
    fn repeated_reads_record_once() {
        let view = fresh(Some(state()));
        view.at("address.city");
        view.get("address").get("city").as_str();
        assert_eq!(view.deps().lock().len(), 2);
    }

    #[test]
    fn missing_values_are_empty_leaves() {
        let view = fresh(None);
        let leaf = view.at("profile.age");
        assert_eq!(leaf.as_i64(), None);
        assert!(leaf.is_null());
        assert!(!leaf.is_present());
        assert_eq!(recorded(&view), vec!["profile", "profile.age"]);
    }

    #[test]
    fn arrays_track_per_index() {
        let view = fresh(Some(state()));
        let tags: Vec<_> = view.get("tags").items().iter().filter_map(|t| t.as_str().map(str::to_string)).collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert!(view.deps().lock().contains("tags.1"));
    }

    #[test]
    fn unrelated_change_is_not_seen() {
        let before = state();
        let view = fresh(Some(before.clone()));
        view.get("name").as_str();

        let mut draft = Draft::new(&before);
        draft.set("x.y", 2).unwrap();
        let after = draft.finish();

        let deps = view.deps().lock();
        assert!(!has_changed(Some(&before), Some(&after), &deps));
    }

    #[test]
    fn tracked_change_is_seen() {
        let before = state();
        let view = fresh(Some(before.clone()));
        view.at("address.city").as_str();

        let mut draft = Draft::new(&before);
        draft.set("address.city", "Bergen").unwrap();
        let after = draft.finish();

        let deps = view.deps().lock();
        assert!(has_changed(Some(&before), Some(&after), &deps));
    }

    #[test]
    fn empty_deps_never_change() {
        let deps = DepSet::new();
        assert!(!has_changed(Some(&state()), None, &deps));
    }

    #[test]
    fn whole_value_reads_track_the_root() {
        let before = state();
        let view = fresh(Some(before.clone()));
        assert!(view.to_value().is_some());
        assert_eq!(recorded(&view), vec![""]);

        let mut draft = Draft::new(&before);
        draft.set("x.y", 5).unwrap();
        let deps = view.deps().lock();
        assert!(has_changed(Some(&before), Some(&draft.finish()), &deps));
    }
}
