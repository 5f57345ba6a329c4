//! Copy-on-Write Drafts
//!
//! A `Draft` is the mutable working copy a mutation function writes to.
//! It starts as a clone of the committed state (a pointer copy) and only
//! allocates when written: every write clones the containers along the
//! written path with `Arc::make_mut` and leaves every other branch shared
//! with the original.
//!
//! # Guarantees
//!
//! After [`Draft::finish`]:
//!
//! - a path that was never written is `Value::same` as in the base
//! - a path that was written is a fresh allocation, up to the root
//! - a draft with no effective writes finishes to the base itself
//!
//! A container is cloned at most once per draft. After the first write the
//! draft holds the only reference to the copy, so `make_mut` mutates it in
//! place from then on.

use std::sync::Arc;

use super::path;
use super::value::Value;
use crate::error::{Error, Result};

/// Mutable working view of a state value.
#[derive(Debug, Clone)]
pub struct Draft {
    root: Value,
}

impl Draft {
    /// Start a draft over `base`.
    pub fn new(base: &Value) -> Self {
        Self { root: base.clone() }
    }

    /// Read the current (possibly already modified) value at `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path::resolve(&self.root, path)
    }

    /// The whole current draft value.
    pub fn current(&self) -> &Value {
        &self.root
    }

    /// Write `value` at `path`, creating missing intermediate objects.
    ///
    /// Writing a value that is `Value::same` as the current one does nothing.
    /// An array index equal to the array's length appends.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(current) = self.get(path) {
            if Value::same(current, &value) {
                return Ok(());
            }
        }

        let segs = path::segments(path);
        let Some((last, parents)) = segs.split_last() else {
            self.root = value;
            return Ok(());
        };

        let parent = descend(&mut self.root, parents, true)?;
        match parent {
            Value::Object(map) => {
                Arc::make_mut(map).insert((*last).to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                let index = parse_index(last, path)?;
                let items = Arc::make_mut(items);
                let len = items.len();
                if index < len {
                    items[index] = value;
                } else if index == len {
                    items.push(value);
                } else {
                    return Err(Error::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                        len,
                    });
                }
                Ok(())
            }
            _ => Err(Error::NotAContainer {
                path: parents.join("."),
            }),
        }
    }

    /// Remove the value at `path`, returning it. Missing paths are not an error.
    pub fn remove(&mut self, path: &str) -> Result<Option<Value>> {
        if self.get(path).is_none() {
            return Ok(None);
        }

        let segs = path::segments(path);
        let Some((last, parents)) = segs.split_last() else {
            return Ok(Some(std::mem::take(&mut self.root)));
        };

        match descend(&mut self.root, parents, false)? {
            Value::Object(map) => Ok(Arc::make_mut(map).shift_remove(*last)),
            Value::Array(items) => {
                let index = parse_index(last, path)?;
                Ok(Some(Arc::make_mut(items).remove(index)))
            }
            _ => Ok(None),
        }
    }

    /// Append to the array at `path`. A missing path becomes a one-element array.
    pub fn push(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if self.get(path).is_none() {
            return self.set(path, Value::from(vec![value]));
        }

        let segs = path::segments(path);
        match descend(&mut self.root, &segs, false)? {
            Value::Array(items) => {
                Arc::make_mut(items).push(value);
                Ok(())
            }
            _ => Err(Error::NotAContainer {
                path: path.to_string(),
            }),
        }
    }

    /// Replace the value at `path` with `f(current)`; absent values read as `Null`.
    pub fn update<F>(&mut self, path: &str, f: F) -> Result<()>
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = match self.get(path) {
            Some(current) => f(current),
            None => f(&Value::Null),
        };
        self.set(path, next)
    }

    /// Mutable access to an existing value.
    ///
    /// This copies every container on the way to `path` even if the caller
    /// never writes through the reference; prefer [`Draft::set`] for plain writes.
    pub fn get_mut(&mut self, path: &str) -> Result<&mut Value> {
        if self.get(path).is_none() {
            return Err(Error::InvalidPath(path.to_string()));
        }
        let segs = path::segments(path);
        descend(&mut self.root, &segs, false)
    }

    /// Finish the draft into the next immutable state.
    pub fn finish(self) -> Value {
        self.root
    }
}

/// Walk `segs` below `node`, copying each container on the way.
fn descend<'v>(mut node: &'v mut Value, segs: &[&str], create: bool) -> Result<&'v mut Value> {
    for (depth, segment) in segs.iter().enumerate() {
        node = child_mut(node, segment, create, || segs[..=depth].join("."))?;
    }
    Ok(node)
}

fn child_mut<'v, P>(node: &'v mut Value, segment: &str, create: bool, path: P) -> Result<&'v mut Value>
where
    P: Fn() -> String,
{
    match node {
        Value::Object(map) => {
            let map = Arc::make_mut(map);
            if create {
                Ok(map.entry(segment.to_string()).or_insert_with(Value::object))
            } else {
                map.get_mut(segment).ok_or_else(|| Error::InvalidPath(path()))
            }
        }
        Value::Array(items) => {
            let index = segment
                .parse::<usize>()
                .map_err(|_| Error::InvalidPath(path()))?;
            let items = Arc::make_mut(items);
            let len = items.len();
            items.get_mut(index).ok_or_else(|| Error::IndexOutOfBounds {
                path: path(),
                index,
                len,
            })
        }
        _ => Err(Error::NotAContainer { path: path() }),
    }
}

fn parse_index(segment: &str, path: &str) -> Result<usize> {
    segment
        .parse::<usize>()
        .map_err(|_| Error::InvalidPath(path.to_string()))
}
