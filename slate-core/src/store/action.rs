//! Actions.
//!
//! An action's type is `"<key>/<mutation>"`, where `key` is a slice
//! namespace optionally suffixed with an instance id (`"user.2"`).

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchMeta;
use crate::state::Value;

/// Separator between the slice key and the mutation name in an action type.
pub const TYPE_SEPARATOR: char = '/';

/// Separator between a namespace and an instance id.
pub const ID_SEPARATOR: char = '.';

/// A dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DispatchMeta>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
            meta: None,
        }
    }

    /// An action addressed to `mutation` on the slice stored under `key`.
    pub fn for_slice(key: &str, mutation: &str) -> Self {
        Self::new(format!("{key}{TYPE_SEPARATOR}{mutation}"))
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_meta(mut self, meta: Option<DispatchMeta>) -> Self {
        self.meta = meta;
        self
    }

    /// Split the type into `(key, mutation)`. A type without a separator
    /// has an empty mutation name.
    pub fn split(&self) -> (&str, &str) {
        self.kind
            .split_once(TYPE_SEPARATOR)
            .unwrap_or((self.kind.as_str(), ""))
    }
}

/// The store key for a namespace and optional instance id.
pub fn slice_key(namespace: &str, id: Option<&str>) -> String {
    match id {
        Some(id) if !id.is_empty() => format!("{namespace}{ID_SEPARATOR}{id}"),
        _ => namespace.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_type() {
        assert_eq!(Action::for_slice("user.2", "setName").split(), ("user.2", "setName"));
        assert_eq!(Action::new("@@init").split(), ("@@init", ""));
    }

    #[test]
    fn keys_join_ids() {
        assert_eq!(slice_key("user", None), "user");
        assert_eq!(slice_key("user", Some("")), "user");
        assert_eq!(slice_key("user", Some("7")), "user.7");
    }

    #[test]
    fn actions_deserialize_from_flux_shape() {
        let action: Action = serde_json::from_str(
            r#"{ "type": "user/setName", "payload": "Alice", "meta": { "debounce": { "wait": 5 } } }"#,
        )
        .unwrap();
        assert_eq!(action.split(), ("user", "setName"));
        assert_eq!(action.payload.as_str(), Some("Alice"));
        assert!(action.meta.and_then(|m| m.debounce).is_some());
    }
}
