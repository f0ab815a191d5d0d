//! Lifecycle timing settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Polling and timeout budget for submissions.
///
/// The poll interval must stay coarse relative to expected job duration
/// (sandbox detonations run seconds to minutes); polling faster only loads
/// the backend without finishing anything sooner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// Milliseconds between status polls (sub-second only makes sense
    /// against stub engines in tests)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Total budget in seconds from submission creation to giving up
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_timeout_secs() -> u64 {
    600
}

impl LifecycleSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
