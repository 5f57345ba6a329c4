//! Per-call-site timers.
//!
//! Each (call site, action type) pair that has dispatched a timed action
//! owns one [`Timer`]. The state machine is small:
//!
//! ```text
//!   Idle ──call──▶ Pending(deadline) ──deadline──▶ Fired
//!                    ▲        │                      │
//!                    └─call───┘◀────────call─────────┘
//! ```
//!
//! `Pending` means a window is open until `deadline`. A deferred dispatch,
//! if any, is a spawned task whose abort handle lives next to the state.
//! Every reschedule bumps `generation`; a task that wakes up holding a stale
//! generation does nothing.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::store::Action;

/// Identity of one dispatch call site.
///
/// Timers are keyed by call site, not by action type alone, so two places
/// dispatching the same action debounce independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteId(u64);

impl CallSiteId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CallSiteId {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a timer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    /// A window is open until `deadline`.
    Pending { deadline: Instant },
    /// The deferred dispatch ran.
    Fired,
}

impl TimerState {
    /// Whether a window is still open at `now`.
    pub fn is_open(&self, now: Instant) -> bool {
        matches!(self, TimerState::Pending { deadline } if now < *deadline)
    }
}

/// Timer bookkeeping for one (call site, action type) pair.
#[derive(Debug, Default)]
pub(crate) struct Timer {
    pub(crate) state: TimerState,
    pub(crate) generation: u64,
    pub(crate) task: Option<AbortHandle>,
    /// Latest suppressed action, for trailing throttle.
    pub(crate) latest: Option<Action>,
    /// The action was addressed to a mounted slice when submitted.
    pub(crate) scoped: bool,
}

impl Timer {
    /// Abort any scheduled task and invalidate it. Returns the new generation.
    pub(crate) fn reschedule(&mut self) -> u64 {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation += 1;
        self.generation
    }

    /// Whether the timer still affects future calls or owns a running task.
    pub(crate) fn is_live(&self, now: Instant) -> bool {
        self.state.is_open(now) || self.latest.is_some() || self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub(crate) fn cancel(&mut self) {
        self.reschedule();
        self.latest = None;
        self.state = TimerState::Idle;
    }
}

/// Key of a timer in the controller's table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TimerKey {
    pub(crate) site: CallSiteId,
    pub(crate) kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn window_closes_at_deadline() {
        let now = Instant::now();
        let state = TimerState::Pending {
            deadline: now + Duration::from_millis(500),
        };
        assert!(state.is_open(now));
        assert!(state.is_open(now + Duration::from_millis(499)));
        assert!(!state.is_open(now + Duration::from_millis(500)));
        assert!(!TimerState::Idle.is_open(now));
        assert!(!TimerState::Fired.is_open(now));
    }

    #[test]
    fn reschedule_bumps_generation() {
        let mut timer = Timer::default();
        assert_eq!(timer.reschedule(), 1);
        assert_eq!(timer.reschedule(), 2);
        timer.cancel();
        assert_eq!(timer.state, TimerState::Idle);
        assert_eq!(timer.generation, 3);
    }

    #[test]
    fn closed_timer_without_task_is_not_live() {
        let now = Instant::now();
        let mut timer = Timer {
            state: TimerState::Pending {
                deadline: now + Duration::from_millis(100),
            },
            ..Timer::default()
        };
        assert!(timer.is_live(now));
        assert!(!timer.is_live(now + Duration::from_millis(100)));

        timer.state = TimerState::Fired;
        assert!(!timer.is_live(now));
        assert!(!Timer::default().is_live(now));
    }

    #[test]
    fn call_sites_are_distinct() {
        assert_ne!(CallSiteId::new(), CallSiteId::new());
    }
}
