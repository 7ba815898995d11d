//! Connector dispatch
//!
//! Every change file names a connector (`001.init.apply.main.sql` runs on
//! connector `main`). The connector's configuration lives under
//! `connectors.<name>.*`, and its `type` selects the [`ConnectorFactory`]:
//!
//! | Type | Backend |
//! |------|---------|
//! | `jdbc` | SQLite connection; content delegated to a script executor |
//! | `shell` | Local shell running the file |
//! | `ssh-commands` | One remote command per non-blank line |
//! | `ssh-script` | File uploaded, run remotely, then removed |
//!
//! Connectors are long-lived: the [`ConnectorManager`] caches one per
//! (name, effective configuration) and subscribes it to close events.

mod jdbc;
mod manager;
mod process;
mod shell;
mod ssh;

use std::sync::Arc;

use schemata_core::{ChangeFile, Closeable, Configuration, Result};

use crate::context::CommandContext;

pub use jdbc::{JdbcConnector, JdbcConnectorFactory, JDBC_TYPE, URL_KEY};
pub use manager::ConnectorManager;
pub use process::{run_process, ProcessOutput, POLL_INTERVAL};
pub use shell::{ShellConnector, ShellConnectorFactory, SHELL_TYPE};
pub use ssh::{
    SshCommandsConnector, SshCommandsConnectorFactory, SshScriptConnector,
    SshScriptConnectorFactory, SshTarget, SSH_COMMANDS_TYPE, SSH_SCRIPT_TYPE,
};

/// Executes change files against one target
pub trait Connector: Send + Sync {
    /// Connector name as configured
    fn name(&self) -> &str;

    /// Run one change file; may block and honours cancellation
    fn execute(&self, change_file: &dyn ChangeFile, ctx: &CommandContext) -> Result<()>;

    /// Release held resources
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Builds connectors of one type
pub trait ConnectorFactory: Send + Sync {
    /// Value of `connectors.<name>.type` this factory serves
    fn connector_type(&self) -> &str;

    /// Build a connector named `name` from its configuration subset
    fn create_connector(
        &self,
        name: &str,
        config: &Configuration,
        ctx: &CommandContext,
    ) -> Result<Arc<dyn Connector>>;
}

/// Adapts a connector to the close-event channel
pub(crate) struct ConnectorCloser(pub(crate) Arc<dyn Connector>);

impl Closeable for ConnectorCloser {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn close(&self) -> Result<()> {
        self.0.close()
    }
}

/// Shell program and leading arguments for running a script file
pub(crate) fn shell_command(config: &Configuration) -> Vec<String> {
    match config.get("shell").map(str::trim).filter(|s| !s.is_empty()) {
        Some(shell) => shell.split_whitespace().map(String::from).collect(),
        None if cfg!(windows) => vec!["cmd".to_string(), "/C".to_string()],
        None => vec!["sh".to_string()],
    }
}
