//! Async Dispatch Controller
//!
//! Sits in front of the reducer pipeline. Actions without timing metadata go
//! straight through, synchronously. Actions carrying `debounce`, `throttle`
//! or `poll` options are routed through the timer of their call site.
//!
//! # Policies
//!
//! - **Leading debounce**: the first call of a burst dispatches at once; every
//!   call, fired or not, pushes the end of the quiet window out by `wait`.
//!   Suppressed calls are dropped, nothing fires on the trailing edge.
//! - **Trailing debounce**: each call replaces the pending one; the last
//!   call dispatches once `wait` has passed without another.
//! - **Throttle**: the first call dispatches and opens a `wait` window. Calls
//!   inside the window are dropped, or with `trailing` the latest of them
//!   dispatches when the window closes (which opens the next window).
//! - **Poll**: dispatches now, then every `interval`, until cancelled, the
//!   call site polls again, or `times` dispatches have happened.
//!   `times: Some(0)` dispatches nothing.
//!
//! Deferred dispatches run on Tokio tasks. A task that wakes up to find its
//! store gone or its call site cancelled drops the action. So does a task
//! whose action was addressed to a mounted slice that has since been
//! unmounted; actions for keys that were never a slice (handled by the seed
//! reducer) always go through. Failures in deferred dispatches have no
//! caller to report to, so they are logged.
//!
//! Timers whose window has closed and whose task has finished are pruned
//! on the next timed submit.

use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::meta::Timing;
use super::timer::{CallSiteId, Timer, TimerKey, TimerState};
use crate::error::{Error, Result};
use crate::store::{Action, Store, WeakStore};

/// Per-call-site timing for one store.
pub struct DispatchController {
    store: WeakStore,
    timers: DashMap<TimerKey, Timer>,
}

impl DispatchController {
    pub(crate) fn new(store: WeakStore) -> Self {
        Self {
            store,
            timers: DashMap::new(),
        }
    }

    /// Dispatch `action` on behalf of `site`, honouring its timing metadata.
    pub fn submit(&self, site: CallSiteId, action: Action) -> Result<()> {
        let Some(store) = self.store.upgrade() else {
            return Ok(());
        };
        let default_wait = store.config().default_wait();
        let Some(timing) = action.meta.as_ref().and_then(|m| m.timing(default_wait)) else {
            return store.dispatch_now(&action);
        };

        self.prune();
        let key = TimerKey {
            site,
            kind: action.kind.clone(),
        };
        let scoped = store.is_mounted(action.split().0);
        match timing {
            Timing::Debounce { wait, leading: true } => self.debounce_leading(&store, key, wait, action),
            Timing::Debounce { wait, leading: false } => self.debounce_trailing(key, wait, scoped, action),
            Timing::Throttle { wait, trailing } => self.throttle(&store, key, wait, trailing, scoped, action),
            Timing::Poll { interval, times } => self.poll(&store, key, interval, times, scoped, action),
        }
    }

    /// Forget timers with nothing left to do: window closed, no live task.
    pub fn prune(&self) {
        let now = Instant::now();
        self.timers.retain(|_, timer| timer.is_live(now));
    }

    /// Cancel every pending dispatch of `site`. Cancelled dispatches never fire.
    pub fn cancel(&self, site: CallSiteId) {
        self.timers.retain(|key, timer| {
            if key.site != site {
                return true;
            }
            timer.cancel();
            false
        });
        trace!(?site, "cancelled call site timers");
    }

    /// Current timer state for a call site and action type.
    pub fn timer_state(&self, site: CallSiteId, kind: &str) -> TimerState {
        let key = TimerKey {
            site,
            kind: kind.to_string(),
        };
        self.timers.get(&key).map_or(TimerState::Idle, |t| t.state)
    }

    /// Number of call-site timers currently tracked.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    fn debounce_leading(&self, store: &Store, key: TimerKey, wait: Duration, action: Action) -> Result<()> {
        let now = Instant::now();
        let fire = {
            let mut timer = self.timers.entry(key).or_default();
            let fire = !timer.state.is_open(now);
            timer.state = TimerState::Pending { deadline: now + wait };
            fire
        };
        if fire {
            debug!(action = %action.kind, "debounce: leading edge");
            store.dispatch_now(&action)
        } else {
            trace!(action = %action.kind, "debounce: suppressed");
            Ok(())
        }
    }

    fn debounce_trailing(&self, key: TimerKey, wait: Duration, scoped: bool, action: Action) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let deadline = Instant::now() + wait;

        let mut timer = self.timers.entry(key.clone()).or_default();
        let generation = timer.reschedule();
        timer.state = TimerState::Pending { deadline };
        timer.scoped = scoped;

        let weak = self.store.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(store) = weak.upgrade() {
                store.controller().fire(&store, &key, generation, action);
            }
        });
        timer.task = Some(task.abort_handle());
        trace!(generation, "debounce: rescheduled trailing edge");
        Ok(())
    }

    fn throttle(
        &self,
        store: &Store,
        key: TimerKey,
        wait: Duration,
        trailing: bool,
        scoped: bool,
        action: Action,
    ) -> Result<()> {
        let now = Instant::now();
        let mut timer = self.timers.entry(key.clone()).or_default();

        if !timer.state.is_open(now) {
            // A trailing task of the previous window may not have run yet.
            timer.reschedule();
            timer.state = TimerState::Pending { deadline: now + wait };
            timer.latest = None;
            drop(timer);
            debug!(action = %action.kind, "throttle: window opened");
            return store.dispatch_now(&action);
        }
        if !trailing {
            trace!(action = %action.kind, "throttle: dropped");
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        timer.latest = Some(action);
        timer.scoped = scoped;
        if timer.task.is_some() {
            return Ok(());
        }

        let deadline = match timer.state {
            TimerState::Pending { deadline } => deadline,
            _ => now,
        };
        let generation = timer.reschedule();
        let weak = self.store.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(store) = weak.upgrade() {
                store.controller().fire_trailing(&store, &key, generation, wait);
            }
        });
        timer.task = Some(task.abort_handle());
        Ok(())
    }

    fn poll(
        &self,
        store: &Store,
        key: TimerKey,
        interval: Duration,
        times: Option<u32>,
        scoped: bool,
        action: Action,
    ) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let generation = {
            let mut timer = self.timers.entry(key.clone()).or_default();
            let generation = timer.reschedule();
            timer.state = TimerState::Fired;
            timer.scoped = scoped;
            generation
        };
        if times == Some(0) {
            trace!(action = %action.kind, "poll: zero times, nothing to do");
            return Ok(());
        }

        store.dispatch_now(&action)?;
        if times.is_some_and(|n| n <= 1) {
            return Ok(());
        }

        let weak = self.store.clone();
        let task_key = key.clone();
        let task = runtime.spawn(async move {
            let mut count = 1;
            loop {
                tokio::time::sleep(interval).await;
                let Some(store) = weak.upgrade() else { break };
                if !store.controller().tick(&store, &task_key, generation, &action) {
                    break;
                }
                count += 1;
                if times.is_some_and(|n| count >= n) {
                    break;
                }
            }
        });

        match self.timers.get_mut(&key) {
            Some(mut timer) if timer.generation == generation => {
                timer.state = TimerState::Pending {
                    deadline: Instant::now() + interval,
                };
                timer.task = Some(task.abort_handle());
            }
            _ => task.abort(),
        }
        debug!(?interval, ?times, "poll: started");
        Ok(())
    }

    /// Trailing debounce wake-up.
    fn fire(&self, store: &Store, key: &TimerKey, generation: u64, action: Action) {
        let scoped = {
            let Some(mut timer) = self.timers.get_mut(key) else {
                return;
            };
            if timer.generation != generation {
                return;
            }
            timer.state = TimerState::Fired;
            timer.task = None;
            timer.scoped
        };
        debug!(action = %action.kind, "debounce: trailing edge");
        deliver(store, &action, scoped);
    }

    /// Trailing throttle wake-up: dispatch the latest suppressed call.
    fn fire_trailing(&self, store: &Store, key: &TimerKey, generation: u64, wait: Duration) {
        let (action, scoped) = {
            let Some(mut timer) = self.timers.get_mut(key) else {
                return;
            };
            if timer.generation != generation {
                return;
            }
            timer.task = None;
            let latest = timer.latest.take();
            timer.state = match latest {
                Some(_) => TimerState::Pending {
                    deadline: Instant::now() + wait,
                },
                None => TimerState::Fired,
            };
            (latest, timer.scoped)
        };
        if let Some(action) = action {
            debug!(action = %action.kind, "throttle: trailing edge");
            deliver(store, &action, scoped);
        }
    }

    /// One poll iteration. Returns `false` when polling should stop.
    fn tick(&self, store: &Store, key: &TimerKey, generation: u64, action: &Action) -> bool {
        let scoped = match self.timers.get(key) {
            Some(timer) if timer.generation == generation => timer.scoped,
            _ => return false,
        };
        deliver(store, action, scoped)
    }
}

impl std::fmt::Debug for DispatchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchController")
            .field("timers", &self.timers.len())
            .finish()
    }
}

/// Dispatch a deferred action. `scoped` actions were addressed to a mounted
/// slice when submitted and are dropped if it is gone.
fn deliver(store: &Store, action: &Action, scoped: bool) -> bool {
    let (key, _) = action.split();
    if scoped && !store.is_mounted(key) {
        debug!(action = %action.kind, "dropping deferred action for unmounted slice");
        return false;
    }
    if let Err(err) = store.dispatch_now(action) {
        warn!(action = %action.kind, error = %err, "deferred dispatch failed");
    }
    true
}
