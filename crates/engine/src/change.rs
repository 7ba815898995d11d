//! Change execution entry point

use std::fmt;
use std::sync::Arc;

use tracing::info;

use schemata_core::{ChangeFile, Environment, Error, Result};

use crate::connector::ConnectorManager;
use crate::context::CommandContext;

/// Runs one change file on the connector it names
pub struct ChangeService {
    connectors: Arc<ConnectorManager>,
    environment: Environment,
}

impl ChangeService {
    /// Service for runs against `environment`
    pub fn new(connectors: Arc<ConnectorManager>, environment: Environment) -> Self {
        ChangeService {
            connectors,
            environment,
        }
    }

    /// Environment this service runs against
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Execute `change_file`
    ///
    /// Fails with `EnvironmentMismatch` when the file is restricted to a
    /// different environment; otherwise resolves the connector and hands the
    /// file over.
    pub fn execute(&self, change_file: &dyn ChangeFile, ctx: &CommandContext) -> Result<()> {
        let id = change_file.id();
        if let Some(expected) = id.environment() {
            if !id.applies_to(self.environment.name()) {
                return Err(Error::EnvironmentMismatch {
                    id: id.to_string(),
                    expected: expected.to_string(),
                    actual: self.environment.name().to_string(),
                });
            }
        }
        ctx.cancellation().check("change execution")?;
        let connector = self.connectors.get_connector_by_name(id.connector(), ctx)?;
        info!(
            target: "schemata::change",
            change = %id,
            connector = id.connector(),
            environment = self.environment.name(),
            "Executing change"
        );
        connector.execute(change_file, ctx)
    }
}

impl fmt::Debug for ChangeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeService")
            .field("environment", &self.environment.name())
            .finish()
    }
}
