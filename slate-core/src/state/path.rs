//! Dot-delimited paths into a value tree.
//!
//! A path like `cars.1.age` addresses the key `cars`, then index `1` of
//! that array, then the key `age`. The empty path addresses the root.

use smallvec::SmallVec;

use super::value::Value;

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Split segments of a path. Most paths are shallow, so they stay inline.
pub type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Split a path into its segments. The empty path has no segments.
pub fn segments(path: &str) -> Segments<'_> {
    if path.is_empty() {
        return Segments::new();
    }
    path.split(SEPARATOR).collect()
}

/// Append one segment to a path.
pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        let mut out = String::with_capacity(prefix.len() + 1 + segment.len());
        out.push_str(prefix);
        out.push(SEPARATOR);
        out.push_str(segment);
        out
    }
}

/// Resolve `path` below `root`, or `None` if any step is missing.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(root, |node, segment| node.child(segment))
}

/// Like [`resolve`], starting from a root that may itself be absent.
pub fn resolve_opt<'a>(root: Option<&'a Value>, path: &str) -> Option<&'a Value> {
    root.and_then(|root| resolve(root, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_handles_empty_prefix() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a.b", "c"), "a.b.c");
    }

    #[test]
    fn resolve_walks_objects_and_arrays() {
        let root = Value::from(json!({ "cars": [{ "age": 10 }, { "age": 35 }] }));
        assert_eq!(resolve(&root, "cars.1.age").and_then(Value::as_i64), Some(35));
        assert!(Value::same(resolve(&root, "").unwrap(), &root));
        assert!(resolve(&root, "cars.7.age").is_none());
        assert!(resolve(&root, "cars.1.age.deeper").is_none());
        assert!(resolve_opt(None, "cars").is_none());
    }
}
