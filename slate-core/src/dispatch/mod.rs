//! Timed Dispatch
//!
//! Actions may carry [`DispatchMeta`] asking for debounce, throttle or poll
//! behaviour. The [`DispatchController`] owned by each store decides, per
//! call site, whether and when such an action reaches the reducers.
//! Undecorated actions bypass it and dispatch synchronously.

mod controller;
mod dispatcher;
mod meta;
mod timer;

pub use controller::DispatchController;
pub use dispatcher::{ActionDispatcher, Transform};
pub(crate) use dispatcher::SiteSet;
pub use meta::{Debounce, DispatchMeta, Poll, Throttle, Timing};
pub use timer::{CallSiteId, TimerState};
