//! Script executor dispatch
//!
//! Database connectors do not interpret change files themselves. They hand
//! the file content to a [`ScriptExecutor`] chosen by file extension:
//!
//! ```text
//! extension --ScriptExecutorManager--> ScriptExecutorFactory
//!           --get_script_executor(name, config)--> cached ScriptExecutor
//! ```
//!
//! The SQL executor is built in; plugins contribute factories for other
//! script languages through the `ServiceRegistry` builder.

mod manager;
mod sql;

use std::sync::Arc;

use schemata_core::{Configuration, Result};

use crate::context::CommandContext;

pub use manager::{ScriptExecutorManager, DEFAULT_INIT_TIMEOUT};
pub use sql::{SqlScriptExecutor, SqlScriptExecutorFactory, DEFAULT_SEPARATOR, SEPARATOR_KEY};

/// A database session a script executor can drive
pub trait SqlConnection {
    /// Execute one statement that returns no rows
    fn execute_update(&self, statement: &str) -> Result<()>;
}

/// Runs script content against a database session
pub trait ScriptExecutor: Send + Sync {
    /// Execute `script` on `connection`
    fn execute(&self, connection: &dyn SqlConnection, script: &str, ctx: &CommandContext) -> Result<()>;
}

/// Builds script executors for a set of file extensions
pub trait ScriptExecutorFactory: Send + Sync {
    /// Extensions handled, matched case-insensitively
    fn extensions(&self) -> Vec<String>;

    /// Executor for the connector `name` with `config`, cached per pair
    fn get_script_executor(
        &self,
        name: &str,
        config: &Configuration,
        ctx: &CommandContext,
    ) -> Result<Arc<dyn ScriptExecutor>>;
}
