//! Error types shared across the store.

use thiserror::Error;

/// Errors produced by drafts, reducers and the dispatch pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A write tried to descend through a scalar value.
    #[error("cannot write below `{path}`: value is not an object or array")]
    NotAContainer { path: String },

    /// An array index was past the end of the array.
    #[error("index {index} out of bounds at `{path}` (len {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    /// A path could not be parsed or addressed nothing writable.
    #[error("invalid path `{0}`")]
    InvalidPath(String),

    /// A mutation function rejected the action.
    #[error("mutation failed: {0}")]
    Mutation(String),

    /// A reducer tried to dispatch while a dispatch was in progress.
    #[error("reducers may not dispatch actions")]
    ReducerDispatch,

    /// Deferred dispatch was requested outside a Tokio runtime.
    #[error("deferred dispatch requires a running Tokio runtime")]
    NoRuntime,

    /// An action payload did not have the shape a mutation expects.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// An async effect failed.
    #[error("effect failed: {0}")]
    Effect(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
