//! Schemata - schema change management
//!
//! Schemata discovers ordered change files, runs each one through a
//! configured connector (SQL, local shell or SSH), records what was applied,
//! and detects drift between recorded and current file content. Runs that
//! mutate shared state take a renewable lease lock, so concurrent
//! invocations against the same store are mutually exclusive.
//!
//! # Quick Start
//!
//! ```ignore
//! use schemata::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::open("schemata-state.db".as_ref())?);
//! let registry = Arc::new(ServiceRegistry::new(store));
//! let pipeline = CommandPipeline::standard(
//!     Arc::clone(&registry),
//!     Arc::new(TomlFileSource::new("schemata.toml")),
//! );
//!
//! let ctx = CommandContext::with_environment(Environment::new("DEV"));
//! let report = pipeline.execute(&ctx, &ApplyCommand)?;
//! println!("{report}");
//!
//! registry.close();
//! ```
//!
//! # Change files
//!
//! ```text
//! <order>.<description>[.<environment>].<apply|revert>.<connector>.<extension>
//! 001.create-users.apply.main.sql
//! 001.create-users.revert.main.sql
//! 002.seed.DEV.apply.ops.sh
//! ```
//!
//! # Architecture
//!
//! | Crate | Role |
//! |-------|------|
//! | `schemata-core` | Identity grammar, configuration, errors, capability traits |
//! | `schemata-storage` | In-memory and SQLite state/lock stores |
//! | `schemata-concurrency` | Renewable reentrant lease lock |
//! | `schemata-engine` | Context, connectors, script executors, state and change services |
//! | `schemata-executor` | Command pipeline and built-in commands |

pub use schemata_executor::*;

pub use schemata_concurrency::{DatabaseLockService, LockGuard, LockService};
pub use schemata_core::{
    ApplyFile, Cancellation, ChangeFile, ChangeFileFactory, ChangeType, Configuration,
    Environment, Error, ExpressionEvaluator, Id, LockRecord, PlainSecretsManager,
    RepositoryProvider, Result, RevertFile, SecretsManager, StateRecord,
};
pub use schemata_engine::{
    CommandContext, Connector, ConnectorFactory, ScriptExecutor, ScriptExecutorFactory,
    ServiceRegistry, ServiceRegistryBuilder, SqlConnection, ValidationFailure, ValidationReport,
};
pub use schemata_storage::{MemoryStore, SqliteStore};
