//! The Store
//!
//! Actions, reducers, the slice registry, and the store that ties them
//! together. Writes always go through [`Store::dispatch`]; the committed
//! state is never mutated in place.

mod action;
mod reducer;
mod registry;
mod slice;
#[allow(clippy::module_inception)]
mod store;

pub use action::{slice_key, Action, ID_SEPARATOR, TYPE_SEPARATOR};
pub use reducer::{IdentityReducer, Mutation, MutationMap, Reducer, SliceReducer, SET_STATE};
pub use registry::SliceRegistry;
pub use slice::{MountHandle, SliceHandle, SliceOptions};
pub use store::{create_store, Store, Subscription, WeakStore, REPLACE};
