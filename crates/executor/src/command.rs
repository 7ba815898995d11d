//! Unit of work run by the pipeline

use schemata_core::Result;
use schemata_engine::CommandContext;

/// A unit of work executed with a fully initialized context
///
/// By the time `execute` runs, the standard interceptors have populated the
/// context with configuration, secrets and services. A command reads what
/// it needs through the `require_*` accessors, which fail with
/// `ContextValueMissing` when an earlier stage did not provide the value.
///
/// ```ignore
/// struct CountApplied;
///
/// impl Command for CountApplied {
///     type Output = usize;
///
///     fn execute(&self, ctx: &CommandContext) -> Result<usize> {
///         Ok(ctx.require_state_service()?.get_state_records()?.len())
///     }
/// }
/// ```
pub trait Command {
    /// Result of a successful run
    type Output;

    /// Run against `ctx`
    fn execute(&self, ctx: &CommandContext) -> Result<Self::Output>;
}
