use tracing::{info, warn};

use schemata_core::Result;
use schemata_engine::{CommandContext, ValidationReport};

use super::changes_directory;
use crate::command::Command;

/// Checks every applied change against the file on disk
///
/// Problems are collected into the report rather than failing the command.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateCommand;

impl Command for ValidateCommand {
    type Output = ValidationReport;

    fn execute(&self, ctx: &CommandContext) -> Result<ValidationReport> {
        let environment = ctx.require_environment()?;
        let directory = changes_directory(ctx.require_configuration()?);
        let report = ctx.require_state_service()?.validate(&directory)?;
        if report.is_valid() {
            info!(target: "schemata::validate", environment = environment.name(), checked = report.checked, "All applied changes match");
        } else {
            for failure in &report.failures {
                warn!(target: "schemata::validate", environment = environment.name(), %failure, "Validation failure");
            }
        }
        Ok(report)
    }
}
