//! Concurrency layer for Schemata
//!
//! This crate implements cross-process mutual exclusion for change runs:
//! - `LockService`: reentrant try-lock / unlock over an external lock row
//! - `DatabaseLockService`: lease-based implementation on `LockStateRepository`
//! - `LockGuard`: releases one level on drop
//! - `Clock`: time source, swappable in tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod lock;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lock::{
    DatabaseLockService, LockGuard, LockService, DEFAULT_LOCK_TIMEOUT, DEFAULT_LOCK_TTL,
    LOCK_ENABLED_KEY, LOCK_TIMEOUT_KEY, LOCK_TTL_KEY,
};
