//! Core types and traits for Schemata
//!
//! This crate defines the foundational types used throughout the system:
//! - Change identity: `Id`, `ChangeType`, `ApplyFile`, `RevertFile`, `ChangeFileFactory`
//! - Configuration: flattened `Configuration`, `Environment`
//! - Named-config caches: `NamedConfigKey`, `NamedConfigCache`, `CachedObjectFactory`
//! - Records: `StateRecord`, `LockRecord`
//! - Repository interfaces: `StateRepository`, `LockStateRepository`, `RepositoryProvider`
//! - Consumed capabilities: `SecretsManager`, `ExpressionEvaluator`
//! - Cancellation and close events
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod cancel;
pub mod change;
pub mod close;
pub mod config;
pub mod environment;
pub mod error;
pub mod expression;
pub mod records;
pub mod repository;
pub mod secrets;

// Re-export commonly used types and traits
pub use cache::{CachedObjectFactory, NamedConfigCache, NamedConfigKey};
pub use cancel::Cancellation;
pub use change::{
    ApplyFile, ChangeFile, ChangeFileFactory, ChangeFiles, ChangeType, Id, RevertFile,
    DEFAULT_MAX_PATH_LENGTH,
};
pub use close::{CloseEvents, Closeable};
pub use config::Configuration;
pub use environment::Environment;
pub use error::{Error, Result};
pub use expression::{ExpressionEvaluator, PlaceholderEvaluator};
pub use records::{LockRecord, StateRecord};
pub use repository::{LockStateRepository, RepositoryProvider, StateRepository};
pub use secrets::{PlainSecretsManager, SecretsManager};
