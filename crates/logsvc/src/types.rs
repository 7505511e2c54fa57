//! Core types for the log service.
//!
//! This module provides:
//! - [`LogLevel`] — Severity levels for log entries
//! - [`Origin`] — Identity of the component that produced an entry
//! - [`LogEntry`] — Immutable log record
//! - [`LogEntryBuilder`] — Validating builder for entries

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{LogError, Result};

/// Log severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Warning conditions
    Warn,
    /// Error conditions
    Error,
}

impl LogLevel {
    /// Returns true if this level is at least as severe as the given level.
    #[must_use]
    pub fn is_at_least(&self, level: Self) -> bool {
        *self >= level
    }

    /// Returns the string representation of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Returns the numeric log-service code (`1` = error .. `4` = debug).
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Error => 1,
            Self::Warn => 2,
            Self::Info => 3,
            Self::Debug => 4,
        }
    }

    /// Maps a numeric log-service code back to a level.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Error),
            2 => Some(Self::Warn),
            3 => Some(Self::Info),
            4 => Some(Self::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the component that produced a log entry.
///
/// The service never interprets these values; they are supplied by whoever
/// builds the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    /// Opaque component identifier
    pub id: u64,
    /// Symbolic name of the component, if known
    #[serde(default)]
    pub symbolic_name: Option<String>,
}

impl Origin {
    /// Creates an origin with only an identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            symbolic_name: None,
        }
    }

    /// Sets the symbolic name.
    #[must_use]
    pub fn with_symbolic_name(mut self, name: impl Into<String>) -> Self {
        self.symbolic_name = Some(name.into());
        self
    }
}

/// An immutable log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    level: LogLevel,
    message: String,
    #[serde(default, deserialize_with = "nonzero_error_code")]
    error_code: Option<i32>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    origin: Origin,
}

// An error code of zero means no error code.
fn nonzero_error_code<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i32>::deserialize(deserializer)?.filter(|code| *code != 0))
}

impl LogEntry {
    /// Creates an entry stamped with the current time and a default origin.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            error_code: None,
            timestamp: Utc::now(),
            origin: Origin::default(),
        }
    }

    /// Creates a new log entry builder.
    #[must_use]
    pub fn builder() -> LogEntryBuilder {
        LogEntryBuilder::default()
    }

    /// Severity level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// The log message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error code attached to the entry, if any.
    #[must_use]
    pub const fn error_code(&self) -> Option<i32> {
        self.error_code
    }

    /// When the entry was created.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Component that produced the entry.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.timestamp.to_rfc3339(),
            self.level,
            self.message
        )?;
        if let Some(code) = self.error_code {
            write!(f, " (code {code})")?;
        }
        Ok(())
    }
}

/// Builder for constructing log entries.
#[derive(Debug, Default)]
pub struct LogEntryBuilder {
    level: Option<LogLevel>,
    message: Option<String>,
    error_code: Option<i32>,
    timestamp: Option<DateTime<Utc>>,
    origin: Origin,
}

impl LogEntryBuilder {
    /// Sets the log level.
    #[must_use]
    pub const fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the error code. Zero means no error code.
    #[must_use]
    pub const fn error_code(mut self, code: i32) -> Self {
        self.error_code = if code == 0 { None } else { Some(code) };
        self
    }

    /// Sets the timestamp. Defaults to the time of [`build`](Self::build).
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the originating component.
    #[must_use]
    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Builds the log entry, returning an error if required fields are missing.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::MissingField`] if the level or message is not set.
    pub fn build(self) -> Result<LogEntry> {
        let level = self.level.ok_or(LogError::MissingField("level"))?;
        let message = self.message.ok_or(LogError::MissingField("message"))?;

        Ok(LogEntry {
            level,
            message,
            error_code: self.error_code,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            origin: self.origin,
        })
    }
}
