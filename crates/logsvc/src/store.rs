//! In-memory entry storage.
//!
//! [`EntryStore`] keeps every appended entry in arrival order behind a single
//! lock. While a delivery worker is running, the store also holds the sending
//! half of the pending-delivery queue so that an append and its enqueue happen
//! under the same lock acquisition.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{LogError, Result};
use crate::types::LogEntry;

/// Sending half of the pending-delivery queue.
pub(crate) type PendingSender = mpsc::UnboundedSender<Arc<LogEntry>>;

#[derive(Default)]
struct StoreState {
    entries: VecDeque<Arc<LogEntry>>,
    pending: Option<PendingSender>,
}

/// Thread-safe, ordered store of log entries.
pub struct EntryStore {
    /// Retention cap, `None` for unbounded
    max_entries: Option<usize>,
    state: RwLock<StoreState>,
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EntryStore {
    /// Creates an empty store, optionally capped at `max_entries`.
    #[must_use]
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            max_entries,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Appends an entry and, if a delivery worker is attached, queues it for
    /// delivery.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::OutOfMemory`] if storage for the entry cannot be
    /// reserved. The store is left unchanged in that case.
    pub fn append(&self, entry: LogEntry) -> Result<()> {
        let entry = Arc::new(entry);
        let mut state = self.state.write();

        state
            .entries
            .try_reserve(1)
            .map_err(|_| LogError::OutOfMemory)?;
        state.entries.push_back(Arc::clone(&entry));

        if let Some(max) = self.max_entries {
            while state.entries.len() > max {
                state.entries.pop_front();
            }
        }

        if let Some(pending) = &state.pending {
            if pending.send(entry).is_err() {
                debug!("Delivery worker gone, entry not queued");
            }
        }

        Ok(())
    }

    /// Returns a point-in-time copy of all stored entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        self.state.read().entries.iter().cloned().collect()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Returns the retention cap.
    #[must_use]
    pub const fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    pub(crate) fn attach_pending(&self, sender: PendingSender) {
        self.state.write().pending = Some(sender);
    }

    pub(crate) fn detach_pending(&self) -> Option<PendingSender> {
        self.state.write().pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;
    use std::thread;

    fn messages(store: &EntryStore) -> Vec<String> {
        store
            .snapshot()
            .iter()
            .map(|e| e.message().to_string())
            .collect()
    }

    #[test]
    fn store_preserves_append_order() {
        let store = EntryStore::default();

        let _ = store.append(LogEntry::new(LogLevel::Info, "first"));
        let _ = store.append(LogEntry::new(LogLevel::Warn, "second"));
        let _ = store.append(LogEntry::new(LogLevel::Error, "third"));

        assert_eq!(messages(&store), vec!["first", "second", "third"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn store_snapshot_is_independent() {
        let store = EntryStore::default();
        let _ = store.append(LogEntry::new(LogLevel::Info, "before"));

        let snapshot = store.snapshot();
        let _ = store.append(LogEntry::new(LogLevel::Info, "after"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn store_empty() {
        let store = EntryStore::default();
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
        assert_eq!(store.max_entries(), None);
    }

    #[test]
    fn store_enforces_max_entries() {
        let store = EntryStore::new(Some(3));

        for i in 0..10 {
            let _ = store.append(LogEntry::new(LogLevel::Info, format!("message {i}")));
        }

        assert_eq!(store.len(), 3);
        assert_eq!(messages(&store), vec!["message 7", "message 8", "message 9"]);
    }

    #[test]
    fn store_forwards_to_attached_queue() {
        let store = EntryStore::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _ = store.append(LogEntry::new(LogLevel::Info, "not queued"));
        store.attach_pending(tx);
        let _ = store.append(LogEntry::new(LogLevel::Info, "queued"));

        let queued = rx.try_recv();
        assert!(matches!(queued, Ok(ref e) if e.message() == "queued"));
        assert!(rx.try_recv().is_err());

        assert!(store.detach_pending().is_some());
        let _ = store.append(LogEntry::new(LogLevel::Info, "after detach"));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn store_append_survives_closed_queue() {
        let store = EntryStore::default();
        let (tx, rx) = mpsc::unbounded_channel();
        store.attach_pending(tx);
        drop(rx);

        let result = store.append(LogEntry::new(LogLevel::Info, "orphan"));
        assert!(result.is_ok());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_concurrent_appends() {
        let store = Arc::new(EntryStore::default());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        let _ = store.append(LogEntry::new(LogLevel::Debug, format!("{t}-{i}")));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().ok();
        }

        assert_eq!(store.len(), 800);
    }
}
