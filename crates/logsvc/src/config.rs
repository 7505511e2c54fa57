//! Log service configuration.

use serde::{Deserialize, Serialize};

/// Default name of the delivery worker thread.
pub const DEFAULT_WORKER_NAME: &str = "log-delivery";

/// Configuration for a [`LogService`](crate::LogService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogServiceConfig {
    /// Maximum number of entries to retain. `None` keeps every entry;
    /// otherwise the oldest entries are evicted first.
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Thread name used for the delivery worker.
    #[serde(default = "default_worker_name")]
    pub worker_name: String,
}

fn default_worker_name() -> String {
    DEFAULT_WORKER_NAME.to_string()
}

impl Default for LogServiceConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            worker_name: default_worker_name(),
        }
    }
}

impl LogServiceConfig {
    /// Caps the number of retained entries.
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Sets the delivery worker thread name.
    #[must_use]
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }
}
