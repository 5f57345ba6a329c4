//! Immutable State Values
//!
//! Every slice holds its state as a `Value`: a JSON-shaped tree whose
//! containers live behind `Arc`. Cloning a value never copies a container,
//! so two versions of a tree can share every branch that did not change.
//!
//! # Identity vs. Equality
//!
//! `PartialEq` compares structurally. Change detection does not use it:
//! [`Value::same`] compares containers by pointer and scalars by value,
//! which is what makes diffing a dependency set cheap regardless of how
//! large the state is.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Number;

/// Ordered key/value map used for object nodes.
pub type Map = IndexMap<String, Value>;

/// A node in an immutable state tree.
#[derive(Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<Map>),
}

impl Value {
    /// An empty object.
    pub fn object() -> Self {
        Value::Object(Arc::new(Map::new()))
    }

    /// An empty array.
    pub fn array() -> Self {
        Value::Array(Arc::new(Vec::new()))
    }

    /// Reference equality.
    ///
    /// Containers are the same only if they are the same allocation;
    /// scalars are the same if they are equal.
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Array(x), Value::Array(y)) => Arc::ptr_eq(x, y),
            (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Reference equality over optional values; two absent values are the same.
    pub fn same_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => Value::same(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this node is an object or array.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a single child by key (objects) or index (arrays).
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Number of children for containers, `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    /// A short name for the kind of node, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Deep-convert into a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => items.iter().map(Value::to_json).collect(),
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                Value::Array(Arc::new(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(Arc::new(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        value.to_json()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(Arc::new(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => serializer.collect_seq(items.iter()),
            Value::Object(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_containers() {
        let value = Value::from(json!({ "a": { "b": 1 } }));
        let copy = value.clone();
        assert!(Value::same(&value, &copy));
    }

    #[test]
    fn equal_but_distinct_containers_are_not_same() {
        let a = Value::from(json!({ "x": [1, 2] }));
        let b = Value::from(json!({ "x": [1, 2] }));
        assert_eq!(a, b);
        assert!(!Value::same(&a, &b));
    }

    #[test]
    fn scalars_compare_by_value() {
        assert!(Value::same(&Value::from("alice"), &Value::from("alice")));
        assert!(Value::same(&Value::from(3), &Value::from(3)));
        assert!(!Value::same(&Value::from(3), &Value::from("3")));
        assert!(Value::same_opt(None, None));
        assert!(!Value::same_opt(Some(&Value::Null), None));
    }

    #[test]
    fn child_addresses_keys_and_indices() {
        let value = Value::from(json!({ "cars": [{ "make": "Ford" }, { "make": "Trabant" }] }));
        let cars = value.child("cars").unwrap();
        assert_eq!(cars.len(), Some(2));
        assert_eq!(cars.child("1").and_then(|c| c.child("make")).and_then(Value::as_str), Some("Trabant"));
        assert!(cars.child("two").is_none());
    }

    #[test]
    fn json_conversion_preserves_order_and_shape() {
        let json = json!({ "z": 1, "a": [true, null, "s"], "m": { "k": 2.5 } });
        let value = Value::from(json.clone());
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn serde_uses_json_shape() {
        let value: Value = serde_json::from_str(r#"{"name":"Alice","tags":["x"]}"#).unwrap();
        assert_eq!(value.child("name").and_then(Value::as_str), Some("Alice"));
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"name":"Alice","tags":["x"]}"#);
    }

    #[test]
    fn json_objects_keep_key_order() {
        let value = Value::from(json!({ "zeta": 1, "alpha": 2, "mid": 3 }));
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"zeta":1,"alpha":2,"mid":3}"#);
    }
}
