//! Reactive Reads
//!
//! This module is the read side of the store: it records what a consumer
//! looked at and decides whether a committed change matters to it.
//!
//! # Concepts
//!
//! ## Tracking
//!
//! A [`TrackingView`] wraps a slice's committed state. Every path read
//! through it lands in a [`DepSet`]. Nested reads produce nested views on
//! demand, so nothing is wrapped that is never read.
//!
//! ## Change Detection
//!
//! [`has_changed`] resolves the recorded paths in the old and new state and
//! compares them by reference. Because drafts share every untouched branch,
//! a path whose value did not change resolves to the very same `Arc`.
//!
//! ## Subscriptions
//!
//! The [`SubscriptionManager`] keeps a single store subscription and calls
//! back only the [`Consumer`]s whose tracked paths changed.

mod consumer;
mod subscriber;
mod subscription;
mod tracking;

pub use consumer::Consumer;
pub use subscriber::{Subscriber, SubscriberId};
pub use subscription::{Detach, SubscriptionManager};
pub use tracking::{has_changed, track, DepSet, SharedDeps, TrackingView};
