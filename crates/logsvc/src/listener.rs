//! Listener capability and the registered listener set.
//!
//! This module provides the [`LogListener`] trait that receives delivered
//! entries, and the internal set used by the delivery pipeline.

use std::sync::Arc;

use crate::types::LogEntry;

/// Receiver of delivered log entries.
///
/// `logged` runs on the delivery worker thread, one entry at a time, in the
/// order entries were appended. A panic inside `logged` is caught and logged;
/// it does not affect other listeners or later entries.
///
/// Implementations may call back into the service from `logged`, including
/// registering or removing listeners. A listener that removes the last
/// listener from inside `logged` stops the worker once the current entry has
/// been dispatched; entries still queued at that point are not delivered.
pub trait LogListener: Send + Sync {
    /// Called once for each delivered entry.
    fn logged(&self, entry: &LogEntry);

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> LogListener for F
where
    F: Fn(&LogEntry) + Send + Sync,
{
    fn logged(&self, entry: &LogEntry) {
        self(entry);
    }
}

/// Shared handle to a registered listener.
pub type ListenerHandle = Arc<dyn LogListener>;

/// Immutable view of the listener set used for one dispatch pass.
pub(crate) type ListenerSnapshot = Arc<[ListenerHandle]>;

/// Listeners identified by handle address. Each listener appears at most once.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: Vec<ListenerHandle>,
}

impl ListenerSet {
    /// Inserts a listener, returning false if it is already present.
    pub(crate) fn insert(&mut self, listener: ListenerHandle) -> bool {
        if self.contains(&listener) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Removes a listener, returning false if it was not present.
    pub(crate) fn remove(&mut self, listener: &ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !same_listener(l, listener));
        self.listeners.len() != before
    }

    /// Removes every listener, returning how many were removed.
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.listeners.len();
        self.listeners.clear();
        removed
    }

    pub(crate) fn contains(&self, listener: &ListenerHandle) -> bool {
        self.listeners.iter().any(|l| same_listener(l, listener))
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn snapshot(&self) -> ListenerSnapshot {
        self.listeners.iter().cloned().collect()
    }
}

// Compares data addresses only; vtable pointers for the same type may differ
// across codegen units.
fn same_listener(a: &ListenerHandle, b: &ListenerHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
