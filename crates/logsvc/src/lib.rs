//! # logsvc
//!
//! In-memory log service with asynchronous listener delivery.
//!
//! This crate provides:
//!
//! - [`LogEntry`] — Immutable log records with level, message, error code,
//!   timestamp and originating component
//! - [`LogLevel`] — Severity levels (Debug, Info, Warn, Error)
//! - [`EntryStore`] — Ordered, thread-safe entry storage
//! - [`LogListener`] — Capability for receiving delivered entries
//! - [`LogService`] — Store plus a delivery worker that runs while listeners
//!   are registered
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use logsvc::{ListenerHandle, LogEntry, LogLevel, LogService};
//!
//! let service = LogService::new();
//!
//! let printer: ListenerHandle = Arc::new(|entry: &LogEntry| println!("{entry}"));
//! service.add_listener(Arc::clone(&printer))?;
//!
//! service.add_entry(LogEntry::new(LogLevel::Info, "Application started"))?;
//! assert_eq!(service.entries().len(), 1);
//!
//! service.remove_listener(&printer)?;
//! # Ok::<(), logsvc::LogError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod delivery;
pub mod error;
pub mod listener;
pub mod service;
pub mod store;
pub mod types;

// Re-export main types
pub use config::LogServiceConfig;
pub use delivery::WorkerState;
pub use error::{LogError, Result};
pub use listener::{ListenerHandle, LogListener};
pub use service::{shared_service, LogService, SharedLogService};
pub use store::EntryStore;
pub use types::{LogEntry, LogEntryBuilder, LogLevel, Origin};
