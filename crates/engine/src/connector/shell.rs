//! Local shell connector

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use tracing::info;

use schemata_core::{ChangeFile, Configuration, Result};

use super::{run_process, shell_command, Connector, ConnectorFactory};
use crate::context::CommandContext;

/// Connector type served by [`ShellConnectorFactory`]
pub const SHELL_TYPE: &str = "shell";

/// Runs each change file as one local shell invocation
#[derive(Debug, Clone)]
pub struct ShellConnector {
    name: String,
    shell: Vec<String>,
    working_directory: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ShellConnector {
    /// Build from `shell`, `working-directory` and `env.*`
    pub fn from_configuration(name: &str, config: &Configuration) -> Self {
        ShellConnector {
            name: name.to_string(),
            shell: shell_command(config),
            working_directory: config
                .get("working-directory")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            env: config.subset("env").as_map().clone(),
        }
    }

    fn command(&self, change_file: &dyn ChangeFile) -> Command {
        let mut command = Command::new(&self.shell[0]);
        command.args(&self.shell[1..]).arg(change_file.file());
        let directory = self
            .working_directory
            .clone()
            .or_else(|| change_file.file().parent().map(PathBuf::from));
        if let Some(directory) = directory {
            command.current_dir(directory);
        }
        command.envs(&self.env);
        command
    }
}

impl Connector for ShellConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, change_file: &dyn ChangeFile, ctx: &CommandContext) -> Result<()> {
        info!(target: "schemata::connector", connector = %self.name, change = %change_file.id(), "Running shell script");
        let label = format!("{} ({})", change_file.id(), self.name);
        run_process(self.command(change_file), None, &label, ctx.cancellation())?;
        Ok(())
    }
}

/// Factory for `shell` connectors
#[derive(Debug, Default)]
pub struct ShellConnectorFactory;

impl ConnectorFactory for ShellConnectorFactory {
    fn connector_type(&self) -> &str {
        SHELL_TYPE
    }

    fn create_connector(
        &self,
        name: &str,
        config: &Configuration,
        _ctx: &CommandContext,
    ) -> Result<Arc<dyn Connector>> {
        Ok(Arc::new(ShellConnector::from_configuration(name, config)))
    }
}
