use tracing::{info, warn};

use schemata_core::{ChangeFile, ChangeType, Error, Id, Result};
use schemata_engine::CommandContext;

use super::{acquire_lock, renew_lock, scan};
use crate::command::Command;
use crate::output::RevertReport;

/// Reverts the most recent applied changes, newest first
///
/// "Most recent" follows change order, not apply time. Every selected
/// change must have a revert file; a missing one fails the command before
/// anything runs. Each revert completion deletes the apply's state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevertCommand {
    /// How many applied changes to undo
    pub count: usize,
}

impl RevertCommand {
    /// Revert the last `count` applied changes
    pub fn new(count: usize) -> Self {
        RevertCommand { count }
    }
}

impl Default for RevertCommand {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Command for RevertCommand {
    type Output = RevertReport;

    fn execute(&self, ctx: &CommandContext) -> Result<RevertReport> {
        let environment = ctx.require_environment()?;
        let state = ctx.require_state_service()?;
        let changes = ctx.require_change_service()?;
        let factory = ctx.require_change_file_factory()?;
        let files = scan(ctx)?;

        let guard = acquire_lock(ctx, "revert")?;
        let mut applied: Vec<Id> = Vec::new();
        for record in state.get_state_records()? {
            match factory.parse(&record.change_file_id) {
                Ok(id) if id.change_type() == Some(ChangeType::Apply) => applied.push(id),
                Ok(_) => {}
                Err(e) => {
                    warn!(target: "schemata::revert", change = %record.change_file_id, error = %e, "Ignoring unparseable state record")
                }
            }
        }
        applied.sort();
        applied.reverse();
        applied.truncate(self.count);

        let mut plan = Vec::with_capacity(applied.len());
        for id in &applied {
            let revert = files.revert_for(id).ok_or_else(|| {
                Error::configuration(format!("no revert file found for applied change '{}'", id))
            })?;
            plan.push((id, revert));
        }

        let mut report = RevertReport {
            environment: environment.name().to_string(),
            reverted: Vec::with_capacity(plan.len()),
        };
        for (id, revert) in plan {
            ctx.cancellation().check("revert")?;
            let _step = renew_lock(ctx, &guard)?;
            changes.execute(revert, ctx)?;
            state.register_completion(revert)?;
            info!(target: "schemata::revert", change = %id, revert = %revert.id(), "Reverted change");
            report.reverted.push(id.to_string());
        }
        Ok(report)
    }
}
