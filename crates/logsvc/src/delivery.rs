//! Asynchronous delivery of entries to listeners.
//!
//! ## Architecture
//! ```text
//! add_entry(entry)
//!     │
//!     └──► EntryStore (write lock) ──► [pending queue] ──► worker thread
//!                                                            │
//!                                 worker's own snapshot ◄────┤
//!                                                            ├──► listener1.logged()
//!                                                            └──► listenerN.logged()
//! ```
//!
//! ## Rules
//! - **One worker**: runs exactly while the listener set is non-empty; a new
//!   worker is spawned only after every retired one has exited
//! - **FIFO**: entries are delivered in append order, one at a time
//! - **Snapshot dispatch**: each entry goes to the listener set as it was
//!   when dispatch of that entry began
//! - **Isolation**: a panicking listener is logged and skipped
//! - **Retirement**: a stopped worker keeps its own, now empty, snapshot, so
//!   anything left in its queue is discarded rather than delivered
//! - **Synchronous stop**: the thread that empties the set waits for the
//!   worker to exit before returning
//!
//! ## Lock order
//! `registry` → store lock, `registry` → worker slot locks. No thread waits
//! for a worker while holding `registry`, and the worker never takes
//! `registry` itself, so listeners may call back into the service.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{LogError, Result};
use crate::listener::{ListenerHandle, ListenerSet, ListenerSnapshot, LogListener};
use crate::store::EntryStore;
use crate::types::LogEntry;

type PendingReceiver = mpsc::UnboundedReceiver<Arc<LogEntry>>;

/// Lifecycle state of the delivery worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// No worker thread exists.
    Stopped,
    /// A worker thread is draining the pending queue.
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    /// Queue closed, listeners cleared, thread not yet exited.
    Retiring,
    Exited,
}

/// State shared between one worker thread and the pipeline.
struct WorkerSlot {
    listeners: RwLock<ListenerSnapshot>,
    /// Replacement queue installed when a retiring worker is revived.
    handoff: Mutex<Option<PendingReceiver>>,
    phase: Mutex<Phase>,
    phase_changed: Condvar,
}

impl WorkerSlot {
    fn new(listeners: ListenerSnapshot) -> Self {
        Self {
            listeners: RwLock::new(listeners),
            handoff: Mutex::new(None),
            phase: Mutex::new(Phase::Running),
            phase_changed: Condvar::new(),
        }
    }

    fn publish(&self, listeners: ListenerSnapshot) {
        *self.listeners.write() = listeners;
    }

    fn snapshot(&self) -> ListenerSnapshot {
        Arc::clone(&*self.listeners.read())
    }

    fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.lock() = phase;
        self.phase_changed.notify_all();
    }

    /// Blocks until the worker has exited or been revived.
    fn wait_while_retiring(&self) -> Phase {
        let mut phase = self.phase.lock();
        while *phase == Phase::Retiring {
            self.phase_changed.wait(&mut phase);
        }
        *phase
    }
}

struct Worker {
    handle: JoinHandle<()>,
    slot: Arc<WorkerSlot>,
}

impl Worker {
    fn is_current_thread(&self) -> bool {
        self.handle.thread().id() == thread::current().id()
    }
}

struct Registry {
    listeners: ListenerSet,
    running: Option<Worker>,
    /// Stopped workers whose threads may still be finishing a dispatch pass.
    retiring: Vec<Worker>,
}

/// Owns the listener set and the delivery worker.
pub(crate) struct DeliveryPipeline {
    worker_name: String,
    /// Lifecycle authority; every start/stop decision happens under this lock.
    registry: Mutex<Registry>,
}

impl DeliveryPipeline {
    pub(crate) fn new(worker_name: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
            registry: Mutex::new(Registry {
                listeners: ListenerSet::default(),
                running: None,
                retiring: Vec::new(),
            }),
        }
    }

    /// Registers a listener, starting the worker if it is the first one.
    ///
    /// Adding a listener that is already registered is a no-op. If a stopped
    /// worker is still finishing its last pass, this waits for it to exit
    /// before starting a new one.
    pub(crate) fn add_listener(
        &self,
        store: &EntryStore,
        listener: ListenerHandle,
    ) -> Result<()> {
        loop {
            let mut guard = self.registry.lock();
            let registry = &mut *guard;

            if registry.listeners.contains(&listener) {
                debug!(listener = listener.name(), "Listener already registered");
                return Ok(());
            }

            if let Some(worker) = &registry.running {
                registry.listeners.insert(Arc::clone(&listener));
                worker.slot.publish(registry.listeners.snapshot());
                self.log_registered(&listener, registry.listeners.len());
                return Ok(());
            }

            if let Some(pos) = registry.retiring.iter().position(Worker::is_current_thread) {
                let worker = registry.retiring.swap_remove(pos);
                registry.listeners.insert(Arc::clone(&listener));
                self.revive(store, &worker, registry.listeners.snapshot());
                registry.running = Some(worker);
                self.log_registered(&listener, registry.listeners.len());
                return Ok(());
            }

            let _ = self.reap(registry);

            if registry.retiring.is_empty() {
                registry.listeners.insert(Arc::clone(&listener));
                return match self.spawn_worker(store, registry.listeners.snapshot()) {
                    Ok(worker) => {
                        registry.running = Some(worker);
                        self.log_registered(&listener, registry.listeners.len());
                        Ok(())
                    }
                    Err(e) => {
                        registry.listeners.remove(&listener);
                        warn!(
                            worker = %self.worker_name,
                            error = %e,
                            "Failed to start delivery worker"
                        );
                        Err(e)
                    }
                };
            }

            let pending: Vec<_> = registry
                .retiring
                .iter()
                .map(|w| Arc::clone(&w.slot))
                .collect();
            drop(guard);

            for slot in pending {
                slot.wait_while_retiring();
            }
        }
    }

    /// Unregisters a listener, stopping the worker if none remain.
    ///
    /// Removing a listener that is not registered is a no-op.
    pub(crate) fn remove_listener(
        &self,
        store: &EntryStore,
        listener: &ListenerHandle,
    ) -> Result<()> {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        if !registry.listeners.remove(listener) {
            return Ok(());
        }

        debug!(
            listener = listener.name(),
            listeners = registry.listeners.len(),
            "Unregistered log listener"
        );

        if !registry.listeners.is_empty() {
            if let Some(worker) = &registry.running {
                worker.slot.publish(registry.listeners.snapshot());
            }
            return Ok(());
        }

        let retired = self.retire_running(store, registry);
        drop(guard);

        match retired {
            Some(slot) => self.await_retired(&slot),
            None => Ok(()),
        }
    }

    /// Unregisters every listener and stops the worker.
    pub(crate) fn remove_all_listeners(&self, store: &EntryStore) -> Result<()> {
        let mut guard = self.registry.lock();
        let registry = &mut *guard;

        let removed = registry.listeners.clear();
        if removed > 0 {
            debug!(removed, "Unregistered all log listeners");
        }

        let retired = self.retire_running(store, registry);
        drop(guard);

        match retired {
            Some(slot) => self.await_retired(&slot),
            None => Ok(()),
        }
    }

    /// Stops the worker and waits for every retired worker to exit, except
    /// one running on the calling thread.
    pub(crate) fn shutdown(&self, store: &EntryStore) -> Result<()> {
        let result = self.remove_all_listeners(store);

        loop {
            let mut guard = self.registry.lock();
            let reaped = self.reap(&mut guard);
            let pending: Vec<_> = guard
                .retiring
                .iter()
                .filter(|w| !w.is_current_thread())
                .map(|w| Arc::clone(&w.slot))
                .collect();
            drop(guard);

            if pending.is_empty() {
                return result.and(reaped);
            }
            for slot in pending {
                slot.wait_while_retiring();
            }
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    pub(crate) fn worker_state(&self) -> WorkerState {
        if self.registry.lock().running.is_some() {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    fn log_registered(&self, listener: &ListenerHandle, listeners: usize) {
        debug!(
            worker = %self.worker_name,
            listener = listener.name(),
            listeners,
            "Registered log listener"
        );
    }

    fn spawn_worker(&self, store: &EntryStore, listeners: ListenerSnapshot) -> Result<Worker> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let slot = Arc::new(WorkerSlot::new(listeners));
        let worker_slot = Arc::clone(&slot);

        let handle = thread::Builder::new()
            .name(self.worker_name.clone())
            .spawn(move || run_worker(&worker_slot, receiver))?;

        store.attach_pending(sender);
        debug!(worker = %self.worker_name, "Started delivery worker");
        Ok(Worker { handle, slot })
    }

    /// Hands a fresh queue to a retiring worker from inside its own dispatch
    /// pass. Entries left in its old queue are dropped.
    fn revive(&self, store: &EntryStore, worker: &Worker, listeners: ListenerSnapshot) {
        let (sender, receiver) = mpsc::unbounded_channel();
        worker.slot.publish(listeners);
        *worker.slot.handoff.lock() = Some(receiver);
        worker.slot.set_phase(Phase::Running);
        store.attach_pending(sender);
        debug!(worker = %self.worker_name, "Revived delivery worker");
    }

    /// Moves the running worker to the retiring list. Returns its slot if the
    /// caller should wait for it to exit.
    fn retire_running(
        &self,
        store: &EntryStore,
        registry: &mut Registry,
    ) -> Option<Arc<WorkerSlot>> {
        let worker = registry.running.take()?;

        worker.slot.publish(Arc::from(Vec::new()));
        // Retiring must be visible before the queue closes, or a fast exit
        // could be overwritten.
        worker.slot.set_phase(Phase::Retiring);
        drop(store.detach_pending());

        let own_thread = worker.is_current_thread();
        let slot = Arc::clone(&worker.slot);
        registry.retiring.push(worker);

        if own_thread {
            debug!(
                worker = %self.worker_name,
                "Delivery worker stopped from its own listener, exits after this pass"
            );
            None
        } else {
            Some(slot)
        }
    }

    fn await_retired(&self, slot: &WorkerSlot) -> Result<()> {
        if slot.wait_while_retiring() == Phase::Running {
            debug!(worker = %self.worker_name, "Delivery worker revived during stop");
            return Ok(());
        }

        let mut guard = self.registry.lock();
        self.reap(&mut guard)?;
        debug!(worker = %self.worker_name, "Stopped delivery worker");
        Ok(())
    }

    /// Joins every retired worker that has exited.
    fn reap(&self, registry: &mut Registry) -> Result<()> {
        let (exited, retiring): (Vec<_>, Vec<_>) = registry
            .retiring
            .drain(..)
            .partition(|w| w.slot.phase() == Phase::Exited);
        registry.retiring = retiring;

        let mut result = Ok(());
        for worker in exited {
            if worker.handle.join().is_err() {
                warn!(worker = %self.worker_name, "Delivery worker panicked");
                result = Err(LogError::WorkerPanicked);
            }
        }
        result
    }
}

/// Marks the slot exited however the worker thread ends.
struct ExitGuard<'a>(&'a WorkerSlot);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.set_phase(Phase::Exited);
    }
}

fn run_worker(slot: &WorkerSlot, mut pending: PendingReceiver) {
    let _exit = ExitGuard(slot);

    while let Some(entry) = pending.blocking_recv() {
        let listeners = slot.snapshot();
        for listener in listeners.iter() {
            dispatch(listener.as_ref(), &entry);
        }
        if let Some(next) = slot.handoff.lock().take() {
            pending = next;
        }
    }
}

fn dispatch(listener: &dyn LogListener, entry: &LogEntry) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener.logged(entry))) {
        warn!(
            listener = listener.name(),
            panic = %panic_message(payload.as_ref()),
            "Log listener panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
