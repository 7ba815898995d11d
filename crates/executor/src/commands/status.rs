use schemata_core::{ChangeFile, Result};
use schemata_engine::CommandContext;

use super::scan;
use crate::command::Command;
use crate::output::StatusReport;

/// Lists applied and pending changes of the environment
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCommand;

impl Command for StatusCommand {
    type Output = StatusReport;

    fn execute(&self, ctx: &CommandContext) -> Result<StatusReport> {
        let environment = ctx.require_environment()?;
        let state = ctx.require_state_service()?;
        let files = scan(ctx)?;
        let applied = state.get_state_records()?;

        let pending = files
            .apply_files
            .iter()
            .map(|file| file.id())
            .filter(|id| id.applies_to(environment.name()))
            .map(|id| id.to_string())
            .filter(|id| !applied.iter().any(|record| &record.change_file_id == id))
            .collect();

        Ok(StatusReport {
            environment: environment.name().to_string(),
            applied,
            pending,
        })
    }
}
