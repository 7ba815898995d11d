//! Error types for the change engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category | Variants | Description |
//! |----------|----------|-------------|
//! | Grammar | `Grammar`, `PathTooLong` | Malformed change file name, raised at discovery |
//! | Environment | `EnvironmentMismatch` | File restricted to another environment |
//! | Resolution | `Configuration`, `UnknownConnectorType`, `UnknownScriptExtension` | Configuration must be fixed |
//! | Lock | `LockLost`, `IllegalLockState`, `LockUnavailable` | Lease coordination |
//! | Context | `ContextValueAlreadySet`, `ContextValueMissing` | Set-once context violations |
//! | Execution | `Execution`, `Sql`, `Interrupted`, `Timeout` | Running a change |
//! | System | `Io`, `Storage`, `Secrets`, `Expression`, `Internal` | Infrastructure errors |
//!
//! Validation drift is deliberately absent: it is reported as data
//! (`ValidationFailure`) so a single validate run lists every problem.

use std::io;
use thiserror::Error;

/// Result type alias for change engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the change engine
#[derive(Debug, Error)]
pub enum Error {
    /// Change file path does not follow the naming grammar
    #[error("invalid change file '{path}': {reason}")]
    Grammar {
        /// Offending relative path
        path: String,
        /// What part of the grammar was violated
        reason: String,
    },

    /// Change file path exceeds the configured maximum length
    #[error("change file path '{path}' is {length} characters long (max {max})")]
    PathTooLong {
        /// Offending relative path
        path: String,
        /// Actual length in characters
        length: usize,
        /// Configured maximum
        max: usize,
    },

    /// Change file restricted to one environment executed in another
    #[error("change file '{id}' targets environment '{expected}' but the active environment is '{actual}'")]
    EnvironmentMismatch {
        /// Stringified change file id
        id: String,
        /// Environment declared by the file
        expected: String,
        /// Environment of the current run
        actual: String,
    },

    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No connector factory registered for a configured type
    #[error("connector '{connector}' has unknown type '{kind}'")]
    UnknownConnectorType {
        /// Connector name
        connector: String,
        /// Configured type string
        kind: String,
    },

    /// No script executor registered for a file extension
    #[error("no script executor registered for extension '{extension}'")]
    UnknownScriptExtension {
        /// Unresolved extension
        extension: String,
    },

    /// A lease believed to be held was found owned by someone else during renewal
    #[error("lock lease '{lock_id}' was lost to another holder")]
    LockLost {
        /// Lock id of this holder
        lock_id: String,
    },

    /// Lock operation invalid in the current local state (e.g. unlock while unheld)
    #[error("illegal lock state: {0}")]
    IllegalLockState(String),

    /// Lock is held by another holder; the caller may retry
    #[error("lock is held by '{holder}' until {expiration}")]
    LockUnavailable {
        /// Current holder token, or `unknown`
        holder: String,
        /// Current expiration, or `unknown`
        expiration: String,
    },

    /// Context value set twice
    #[error("context value '{0}' is already set")]
    ContextValueAlreadySet(&'static str),

    /// Context value read before being set
    #[error("context value '{0}' is not set")]
    ContextValueMissing(&'static str),

    /// Work was cancelled while blocked
    #[error("interrupted: {0}")]
    Interrupted(String),

    /// External process or remote command failed
    #[error("execution failed: {0}")]
    Execution(String),

    /// SQL statement failed
    #[error("SQL statement failed: {reason}\nstatement: {statement}")]
    Sql {
        /// Offending statement text
        statement: String,
        /// Driver message
        reason: String,
    },

    /// Bounded wait elapsed
    #[error("timed out: {0}")]
    Timeout(String),

    /// I/O error (file operations, process spawning, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// State or lock store error
    #[error("storage error: {0}")]
    Storage(String),

    /// Secrets capability error
    #[error("secrets error: {0}")]
    Secrets(String),

    /// Expression evaluation error
    #[error("expression error: {0}")]
    Expression(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a grammar error for `path`.
    pub fn grammar(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Grammar {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Error::Configuration(reason.into())
    }

    /// Build a storage error.
    pub fn storage(reason: impl Into<String>) -> Self {
        Error::Storage(reason.into())
    }

    /// True for errors caused by cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted(_))
    }
}
