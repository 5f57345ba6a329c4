//! Reducers
//!
//! A reducer maps `(state, action)` to the next state. The store composes
//! one [`SliceReducer`] per mounted slice with a seed reducer supplied at
//! construction.
//!
//! Slice reducers are generated, not written by hand: they route an action
//! to one named mutation function, run it against a [`Draft`], and finish
//! the draft. Anything not addressed to the slice's key comes back as the
//! very same value, which is what lets change detection compare by pointer.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::action::Action;
use crate::error::{Error, Result};
use crate::state::{Draft, Value};

/// Name of the mutation every slice understands: payload `[path, value]`.
pub const SET_STATE: &str = "@@setState";

/// Anything that can reduce an action into a next state.
///
/// `state` is `None` when the reducer has never produced a value, in which
/// case it should return its initial state.
pub trait Reducer: Send + Sync {
    fn reduce(&self, state: Option<&Value>, action: &Action) -> Result<Value>;
}

impl<F> Reducer for F
where
    F: Fn(Option<&Value>, &Action) -> Result<Value> + Send + Sync,
{
    fn reduce(&self, state: Option<&Value>, action: &Action) -> Result<Value> {
        self(state, action)
    }
}

/// Seed reducer that passes state through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReducer;

impl Reducer for IdentityReducer {
    fn reduce(&self, state: Option<&Value>, _action: &Action) -> Result<Value> {
        Ok(state.cloned().unwrap_or_else(Value::object))
    }
}

/// A mutation function: writes the effect of an action into a draft.
pub type Mutation = Arc<dyn Fn(&mut Draft, &Action) -> Result<()> + Send + Sync>;

/// Mutation functions by name, in registration order.
pub type MutationMap = IndexMap<String, Mutation>;

/// The generated reducer for one slice key.
pub struct SliceReducer {
    key: String,
    initial: Value,
    mutations: Arc<MutationMap>,
}

impl SliceReducer {
    pub fn new(key: impl Into<String>, initial: Value, mutations: Arc<MutationMap>) -> Self {
        Self {
            key: key.into(),
            initial,
            mutations,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn initial(&self) -> &Value {
        &self.initial
    }

    fn apply(&self, state: &Value, action: &Action, mutation: &str) -> Result<Value> {
        let mut draft = Draft::new(state);
        match self.mutations.get(mutation) {
            Some(f) => f(&mut draft, action)?,
            None if mutation == SET_STATE => set_state(&mut draft, action)?,
            None => return Ok(state.clone()),
        }
        Ok(draft.finish())
    }
}

impl Reducer for SliceReducer {
    fn reduce(&self, state: Option<&Value>, action: &Action) -> Result<Value> {
        let state = state.unwrap_or(&self.initial);
        let (key, mutation) = action.split();
        if key != self.key {
            return Ok(state.clone());
        }
        self.apply(state, action, mutation)
    }
}

impl fmt::Debug for SliceReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceReducer")
            .field("key", &self.key)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn set_state(draft: &mut Draft, action: &Action) -> Result<()> {
    let invalid = || Error::InvalidPayload(format!("{SET_STATE} expects [path, value]"));
    let items = action.payload.as_array().ok_or_else(invalid)?;
    match items {
        [Value::String(path), value] => draft.set(path, value.clone()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter() -> SliceReducer {
        let mut mutations = MutationMap::new();
        let inc: Mutation = Arc::new(|draft: &mut Draft, _: &Action| {
            draft.update("count", |v| Value::from(v.as_i64().unwrap_or(0) + 1))
        });
        let fail: Mutation = Arc::new(|draft: &mut Draft, _: &Action| {
            draft.set("count", 99)?;
            Err(Error::Mutation("refused".into()))
        });
        mutations.insert("inc".into(), inc);
        mutations.insert("fail".into(), fail);
        SliceReducer::new("A", Value::from(json!({ "count": 0, "other": {} })), Arc::new(mutations))
    }

    #[test]
    fn missing_state_starts_from_initial() {
        let reducer = counter();
        let next = reducer.reduce(None, &Action::new("@@init")).unwrap();
        assert!(Value::same(&next, reducer.initial()));
    }

    #[test]
    fn foreign_actions_return_same_state() {
        let reducer = counter();
        let state = Value::from(json!({ "count": 4 }));
        for kind in ["B/inc", "A.1/inc", "A/unknown", "A"] {
            let next = reducer.reduce(Some(&state), &Action::new(kind)).unwrap();
            assert!(Value::same(&next, &state), "{kind} changed state");
        }
    }

    #[test]
    fn mutation_applies_through_draft() {
        let reducer = counter();
        let state = reducer.initial().clone();
        let next = reducer.reduce(Some(&state), &Action::new("A/inc")).unwrap();
        assert_eq!(next.child("count").and_then(Value::as_i64), Some(1));
        assert!(Value::same(next.child("other").unwrap(), state.child("other").unwrap()));
    }

    #[test]
    fn failing_mutation_leaves_state_alone() {
        let reducer = counter();
        let state = reducer.initial().clone();
        let err = reducer.reduce(Some(&state), &Action::new("A/fail")).unwrap_err();
        assert_eq!(err, Error::Mutation("refused".into()));
        assert_eq!(state.child("count").and_then(Value::as_i64), Some(0));
    }

    #[test]
    fn set_state_writes_a_path() {
        let reducer = counter();
        let action = Action::for_slice("A", SET_STATE).with_payload(json!(["other.name", "x"]));
        let next = reducer.reduce(None, &action).unwrap();
        assert_eq!(next.to_json(), json!({ "count": 0, "other": { "name": "x" } }));

        let bad = Action::for_slice("A", SET_STATE).with_payload(json!({ "path": "x" }));
        assert!(matches!(reducer.reduce(None, &bad), Err(Error::InvalidPayload(_))));
    }
}
