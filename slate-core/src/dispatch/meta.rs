//! Dispatch metadata.
//!
//! Actions may carry timing options that decide when, or whether, they reach
//! the reducers. The options mirror the JSON objects callers pass:
//!
//! ```json
//! { "debounce": { "leading": true, "wait": 500 } }
//! ```
//!
//! Unknown keys are ignored. Missing waits fall back to the store's
//! configured default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing options attached to an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce: Option<Debounce>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle: Option<Throttle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
}

/// Debounce options. `wait` is in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Debounce {
    pub leading: bool,
    pub wait: Option<u64>,
}

/// Throttle options. `wait` is in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Throttle {
    pub wait: Option<u64>,
    pub trailing: bool,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            wait: None,
            trailing: true,
        }
    }
}

/// Polling options. `interval` is in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Poll {
    pub interval: Option<u64>,
    /// Total dispatches, the immediate one included. `None` polls until
    /// cancelled, `Some(0)` dispatches nothing.
    pub times: Option<u32>,
}

/// The single timing policy an action resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Debounce { wait: Duration, leading: bool },
    Throttle { wait: Duration, trailing: bool },
    Poll { interval: Duration, times: Option<u32> },
}

impl DispatchMeta {
    pub fn debounce(wait_ms: u64, leading: bool) -> Self {
        Self {
            debounce: Some(Debounce {
                leading,
                wait: Some(wait_ms),
            }),
            ..Self::default()
        }
    }

    pub fn throttle(wait_ms: u64, trailing: bool) -> Self {
        Self {
            throttle: Some(Throttle {
                wait: Some(wait_ms),
                trailing,
            }),
            ..Self::default()
        }
    }

    pub fn poll(interval_ms: u64, times: Option<u32>) -> Self {
        Self {
            poll: Some(Poll {
                interval: Some(interval_ms),
                times,
            }),
            ..Self::default()
        }
    }

    /// Resolve the options into one policy. Debounce wins over throttle,
    /// throttle over poll.
    pub fn timing(&self, default_wait: Duration) -> Option<Timing> {
        let ms = |v: Option<u64>| v.map(Duration::from_millis).unwrap_or(default_wait);

        if let Some(d) = self.debounce {
            return Some(Timing::Debounce {
                wait: ms(d.wait),
                leading: d.leading,
            });
        }
        if let Some(t) = self.throttle {
            return Some(Timing::Throttle {
                wait: ms(t.wait),
                trailing: t.trailing,
            });
        }
        self.poll.map(|p| Timing::Poll {
            interval: ms(p.interval),
            times: p.times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_and_ignores_unknown_keys() {
        let meta: DispatchMeta = serde_json::from_str(
            r#"{ "debounce": { "leading": true, "wait": 500, "maxWait": 9 }, "retry": 3 }"#,
        )
        .unwrap();
        assert_eq!(meta, DispatchMeta::debounce(500, true));
    }

    #[test]
    fn missing_wait_uses_default() {
        let meta: DispatchMeta = serde_json::from_str(r#"{ "throttle": {} }"#).unwrap();
        assert_eq!(
            meta.timing(Duration::from_millis(300)),
            Some(Timing::Throttle {
                wait: Duration::from_millis(300),
                trailing: true
            })
        );
    }

    #[test]
    fn debounce_takes_precedence() {
        let meta = DispatchMeta {
            throttle: Some(Throttle::default()),
            ..DispatchMeta::debounce(10, false)
        };
        assert!(matches!(
            meta.timing(Duration::ZERO),
            Some(Timing::Debounce { leading: false, .. })
        ));
        assert_eq!(DispatchMeta::default().timing(Duration::ZERO), None);
    }
}
