//! The log service: entry storage plus listener delivery.

use std::sync::Arc;

use tracing::warn;

use crate::config::LogServiceConfig;
use crate::delivery::{DeliveryPipeline, WorkerState};
use crate::error::Result;
use crate::listener::ListenerHandle;
use crate::store::EntryStore;
use crate::types::LogEntry;

/// Thread-safe log service.
///
/// Stores every entry passed to [`add_entry`](Self::add_entry) and delivers
/// it, on a dedicated worker thread, to every registered listener. The worker
/// runs only while at least one listener is registered.
pub struct LogService {
    store: EntryStore,
    delivery: DeliveryPipeline,
}

impl Default for LogService {
    fn default() -> Self {
        Self::new()
    }
}

impl LogService {
    /// Creates an empty service with no listeners and no running worker.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LogServiceConfig::default())
    }

    /// Creates an empty service with the given configuration.
    #[must_use]
    pub fn with_config(config: LogServiceConfig) -> Self {
        Self {
            store: EntryStore::new(config.max_entries),
            delivery: DeliveryPipeline::new(config.worker_name),
        }
    }

    /// Stores an entry and queues it for delivery if any listener is registered.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::OutOfMemory`](crate::LogError::OutOfMemory) if the
    /// entry cannot be stored.
    pub fn add_entry(&self, entry: LogEntry) -> Result<()> {
        self.store.append(entry)
    }

    /// Returns a copy of all stored entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Arc<LogEntry>> {
        self.store.snapshot()
    }

    /// Registers a listener. The first registration starts the delivery worker.
    ///
    /// Registering the same handle twice has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::WorkerSpawn`](crate::LogError::WorkerSpawn) if the
    /// worker cannot be started; the listener is not registered in that case.
    pub fn add_listener(&self, listener: ListenerHandle) -> Result<()> {
        self.delivery.add_listener(&self.store, listener)
    }

    /// Unregisters a listener. Removing the last one stops the worker and
    /// waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::WorkerPanicked`](crate::LogError::WorkerPanicked)
    /// if the worker terminated abnormally. The listener is removed and the
    /// worker is stopped regardless.
    pub fn remove_listener(&self, listener: &ListenerHandle) -> Result<()> {
        self.delivery.remove_listener(&self.store, listener)
    }

    /// Unregisters every listener and stops the worker.
    ///
    /// # Errors
    ///
    /// See [`remove_listener`](Self::remove_listener).
    pub fn remove_all_listeners(&self) -> Result<()> {
        self.delivery.remove_all_listeners(&self.store)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.delivery.listener_count()
    }

    /// Returns whether the delivery worker is running.
    #[must_use]
    pub fn worker_state(&self) -> WorkerState {
        self.delivery.worker_state()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns the underlying entry store.
    #[must_use]
    pub const fn store(&self) -> &EntryStore {
        &self.store
    }
}

impl Drop for LogService {
    fn drop(&mut self) {
        if let Err(e) = self.delivery.shutdown(&self.store) {
            warn!(error = %e, "Delivery worker did not stop cleanly");
        }
    }
}

/// Shared log service handle.
pub type SharedLogService = Arc<LogService>;

/// Creates a new shared log service with the default configuration.
#[must_use]
pub fn shared_service() -> SharedLogService {
    Arc::new(LogService::new())
}
