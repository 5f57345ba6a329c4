//! State Trees
//!
//! Slice state is an immutable tree of [`Value`]s. Mutation never happens in
//! place: a mutation function writes to a [`Draft`], and finishing the draft
//! produces a new tree that shares every untouched branch with the old one.
//!
//! Structural sharing is what the rest of the store relies on. Reducers
//! return the previous value untouched when an action is not theirs, and
//! the subscription layer compares recorded paths with [`Value::same`]
//! instead of deep equality.

mod draft;
pub mod path;
mod value;

pub use draft::Draft;
pub use value::{Map, Value};
