//! Slate Core
//!
//! This crate provides the core of the Slate state container. It implements:
//!
//! - An immutable state tree with copy-on-write drafts
//! - Dynamically mounted slices composed into one store
//! - Path-level dependency tracking for selective re-rendering
//! - Debounced, throttled, and polled dispatch
//! - Async effects with loading flags
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `state`: the value tree, dot paths, and [`Draft`]
//! - `store`: actions, reducers, the slice registry, and the [`Store`]
//! - `reactive`: tracking views, change detection, and consumers
//! - `dispatch`: timing metadata and the per-call-site dispatch controller
//! - `effect`: async effects bound to a slice
//!
//! # Example
//!
//! ```rust,ignore
//! use slate_core::{Action, Draft, SliceOptions, Store};
//! use serde_json::json;
//!
//! let store = Store::default();
//! let user = store.create_slice(
//!     SliceOptions::new("user", json!({ "name": "", "age": 0 }))
//!         .mutation("setName", |draft: &mut Draft, action: &Action| {
//!             draft.set("name", action.payload.clone())
//!         }),
//! );
//! let _mount = user.mount(None)?;
//!
//! // Re-render only when `age` changes.
//! let consumer = user.consumer(None, || println!("age changed"));
//! consumer.track().get("age").as_i64();
//!
//! // Does not call the consumer back.
//! user.dispatch("setName", "Alice", None)?;
//! assert_eq!(user.read(None).get("name").as_str(), Some("Alice"));
//! ```

pub mod config;
pub mod dispatch;
pub mod effect;
pub mod error;
pub mod reactive;
pub mod state;
pub mod store;

pub use config::StoreConfig;
pub use dispatch::{ActionDispatcher, CallSiteId, DispatchMeta, TimerState};
pub use effect::{EffectContext, EffectHandle};
pub use error::{Error, Result};
pub use reactive::{has_changed, track, Consumer, DepSet, TrackingView};
pub use state::{Draft, Map, Value};
pub use store::{create_store, Action, MountHandle, Reducer, SliceHandle, SliceOptions, Store, Subscription};
