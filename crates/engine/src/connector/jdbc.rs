//! Database connector
//!
//! Keeps one SQLite connection per (name, configuration) and hands each
//! change file's content to the script executor registered for its
//! extension.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info};

use schemata_core::{ChangeFile, Configuration, Error, Result};

use super::{Connector, ConnectorFactory};
use crate::context::CommandContext;
use crate::script::{ScriptExecutorManager, SqlConnection};

/// Connector type served by [`JdbcConnectorFactory`]
pub const JDBC_TYPE: &str = "jdbc";
/// Connector configuration key for the database location
pub const URL_KEY: &str = "url";

struct Session<'a>(&'a Connection);

impl SqlConnection for Session<'_> {
    fn execute_update(&self, statement: &str) -> Result<()> {
        self.0.execute_batch(statement).map_err(|e| Error::Sql {
            statement: statement.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Connector bound to one SQLite database
pub struct JdbcConnector {
    name: String,
    url: String,
    config: Configuration,
    connection: Mutex<Option<Connection>>,
    script_executors: Arc<ScriptExecutorManager>,
}

impl JdbcConnector {
    /// Open the database named by `url` (`sqlite:<path>`, `<path>` or `:memory:`)
    pub fn open(
        name: &str,
        config: &Configuration,
        script_executors: Arc<ScriptExecutorManager>,
    ) -> Result<Self> {
        let url = config.require(URL_KEY).map_err(|_| {
            Error::configuration(format!("connector '{}' requires '{}'", name, URL_KEY))
        })?;
        let connection = open_url(url)?;
        info!(target: "schemata::connector", connector = name, url, "Database connection opened");
        Ok(JdbcConnector {
            name: name.to_string(),
            url: url.to_string(),
            config: config.clone(),
            connection: Mutex::new(Some(connection)),
            script_executors,
        })
    }

    /// Database location as configured
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run `f` on the open connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.connection.lock();
        let connection = guard
            .as_ref()
            .ok_or_else(|| Error::Execution(format!("connector '{}' is closed", self.name)))?;
        f(connection)
    }
}

fn open_url(url: &str) -> Result<Connection> {
    let location = url.strip_prefix("jdbc:").unwrap_or(url);
    let location = location.strip_prefix("sqlite:").unwrap_or(location).trim();
    let opened = if location == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(Path::new(location))
    };
    opened.map_err(|e| Error::Execution(format!("failed to open database '{}': {}", url, e)))
}

impl Connector for JdbcConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, change_file: &dyn ChangeFile, ctx: &CommandContext) -> Result<()> {
        let id = change_file.id();
        let script = std::fs::read_to_string(change_file.file())?;
        let executor = self
            .script_executors
            .get_script_executor_factory_by_extension(id.extension())?
            .get_script_executor(&self.name, &self.config, ctx)?;
        debug!(target: "schemata::connector", connector = %self.name, change = %id, "Running script");
        self.with_connection(|connection| executor.execute(&Session(connection), &script, ctx))
    }

    fn close(&self) -> Result<()> {
        if let Some(connection) = self.connection.lock().take() {
            connection
                .close()
                .map_err(|(_, e)| Error::Execution(format!("failed to close '{}': {}", self.name, e)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for JdbcConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JdbcConnector")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("open", &self.connection.lock().is_some())
            .finish()
    }
}

/// Factory for `jdbc` connectors
#[derive(Debug)]
pub struct JdbcConnectorFactory {
    script_executors: Arc<ScriptExecutorManager>,
}

impl JdbcConnectorFactory {
    /// Factory resolving scripts through `script_executors`
    pub fn new(script_executors: Arc<ScriptExecutorManager>) -> Self {
        JdbcConnectorFactory { script_executors }
    }
}

impl ConnectorFactory for JdbcConnectorFactory {
    fn connector_type(&self) -> &str {
        JDBC_TYPE
    }

    fn create_connector(
        &self,
        name: &str,
        config: &Configuration,
        _ctx: &CommandContext,
    ) -> Result<Arc<dyn Connector>> {
        Ok(Arc::new(JdbcConnector::open(
            name,
            config,
            Arc::clone(&self.script_executors),
        )?))
    }
}
