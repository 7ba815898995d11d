//! Built-in SQL script executor

use std::sync::Arc;

use tracing::debug;

use schemata_core::{CachedObjectFactory, Configuration, Error, NamedConfigCache, Result};

use super::{ScriptExecutor, ScriptExecutorFactory, SqlConnection};
use crate::context::CommandContext;

/// Connector configuration key for the statement separator
pub const SEPARATOR_KEY: &str = "separator";
/// Separator used when none is configured
pub const DEFAULT_SEPARATOR: &str = ";";

/// Splits a script on a separator and runs each statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlScriptExecutor {
    /// `None` runs the whole script as one statement
    separator: Option<String>,
}

impl SqlScriptExecutor {
    /// Executor splitting on `separator`
    pub fn new(separator: impl Into<String>) -> Self {
        SqlScriptExecutor {
            separator: Some(separator.into()),
        }
    }

    /// Executor that never splits
    pub fn unsplit() -> Self {
        SqlScriptExecutor { separator: None }
    }

    /// Read `separator` from a connector configuration (`none` disables splitting)
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        match config.get(SEPARATOR_KEY) {
            None => Ok(Self::new(DEFAULT_SEPARATOR)),
            Some(value) if value.eq_ignore_ascii_case("none") => Ok(Self::unsplit()),
            Some("") => Err(Error::configuration(
                "SQL separator must not be empty (use 'none' to disable splitting)",
            )),
            Some(value) => Ok(Self::new(value)),
        }
    }

    /// Non-blank, trimmed statements of `script`
    pub fn statements<'a>(&self, script: &'a str) -> Vec<&'a str> {
        let segments: Vec<&str> = match &self.separator {
            Some(separator) => script.split(separator.as_str()).collect(),
            None => vec![script],
        };
        segments
            .into_iter()
            .map(str::trim)
            .filter(|statement| !statement.is_empty())
            .collect()
    }
}

impl ScriptExecutor for SqlScriptExecutor {
    fn execute(&self, connection: &dyn SqlConnection, script: &str, ctx: &CommandContext) -> Result<()> {
        for statement in self.statements(script) {
            ctx.cancellation().check("SQL script")?;
            debug!(target: "schemata::sql", statement, "Executing statement");
            connection.execute_update(statement).map_err(|e| match e {
                Error::Sql { .. } | Error::Interrupted(_) => e,
                other => Error::Sql {
                    statement: statement.to_string(),
                    reason: other.to_string(),
                },
            })?;
        }
        Ok(())
    }
}

/// Factory for the `sql` extension
#[derive(Debug, Default)]
pub struct SqlScriptExecutorFactory {
    cache: NamedConfigCache<Arc<dyn ScriptExecutor>>,
}

impl SqlScriptExecutorFactory {
    /// Create a factory with an empty cache
    pub fn new() -> Self {
        Self::default()
    }
}

impl CachedObjectFactory<CommandContext> for SqlScriptExecutorFactory {
    type Object = Arc<dyn ScriptExecutor>;

    fn cache(&self) -> &NamedConfigCache<Self::Object> {
        &self.cache
    }

    fn create_new_object(
        &self,
        name: &str,
        config: &Configuration,
        _ctx: &CommandContext,
    ) -> Result<Self::Object> {
        let executor = SqlScriptExecutor::from_configuration(config)?;
        debug!(target: "schemata::sql", connector = name, ?executor, "Created SQL executor");
        Ok(Arc::new(executor))
    }
}

impl ScriptExecutorFactory for SqlScriptExecutorFactory {
    fn extensions(&self) -> Vec<String> {
        vec!["sql".to_string()]
    }

    fn get_script_executor(
        &self,
        name: &str,
        config: &Configuration,
        ctx: &CommandContext,
    ) -> Result<Arc<dyn ScriptExecutor>> {
        self.get_object(name, config, ctx)
    }
}
