//! Store configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options fixed when a store is created.
///
/// Deserializes from a JSON object; unknown keys are ignored and missing
/// keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key of the built-in slice holding async effect loading flags.
    pub loading_namespace: String,
    /// Wait used by debounce/throttle/poll options that omit one, in ms.
    pub default_wait_ms: u64,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loading_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.loading_namespace = namespace.into();
        self
    }

    pub fn with_default_wait(mut self, wait: Duration) -> Self {
        self.default_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            loading_namespace: "@@loading".to_string(),
            default_wait_ms: 300,
        }
    }
}
