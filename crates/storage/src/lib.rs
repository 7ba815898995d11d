//! Storage layer for Schemata
//!
//! Reference implementations of the repository interfaces defined in
//! `schemata-core`:
//! - `MemoryStore`: process-local lock row and per-environment state maps
//! - `SqliteStore`: the same contract persisted in a SQLite database, so
//!   separate processes sharing the file coordinate through the lock row
//!
//! Both implement `RepositoryProvider`, which is what the service layer
//! consumes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryLockStateRepository, MemoryStateRepository, MemoryStore};
pub use sqlite::{SqliteLockStateRepository, SqliteStateRepository, SqliteStore};
