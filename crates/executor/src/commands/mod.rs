//! Built-in commands
//!
//! | Command | Lock | Output |
//! |---------|------|--------|
//! | [`ApplyCommand`] | yes | [`ApplyReport`](crate::ApplyReport) |
//! | [`RevertCommand`] | yes | [`RevertReport`](crate::RevertReport) |
//! | [`ValidateCommand`] | no | [`ValidationReport`](schemata_engine::ValidationReport) |
//! | [`StatusCommand`] | no | [`StatusReport`](crate::StatusReport) |
//!
//! All of them require an environment in the context.

mod apply;
mod revert;
mod status;
mod validate;

pub use apply::ApplyCommand;
pub use revert::RevertCommand;
pub use status::StatusCommand;
pub use validate::ValidateCommand;

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use schemata_concurrency::{LockGuard, DEFAULT_LOCK_TIMEOUT, LOCK_TIMEOUT_KEY};
use schemata_core::{ChangeFiles, Configuration, Error, Result};
use schemata_engine::CommandContext;

/// Configuration key for the root of the change files
pub const CHANGES_DIRECTORY_KEY: &str = "changes.directory";
/// Default root of the change files
pub const DEFAULT_CHANGES_DIRECTORY: &str = "changes";

pub(crate) fn changes_directory(config: &Configuration) -> PathBuf {
    PathBuf::from(config.get_or(CHANGES_DIRECTORY_KEY, DEFAULT_CHANGES_DIRECTORY))
}

pub(crate) fn scan(ctx: &CommandContext) -> Result<ChangeFiles> {
    let directory = changes_directory(ctx.require_configuration()?);
    ctx.require_change_file_factory()?.scan(&directory)
}

/// Take the lock for `operation`, or run unlocked when no lock service exists
///
/// Contention is reported as `LockUnavailable` with the current holder.
pub(crate) fn acquire_lock<'a>(ctx: &'a CommandContext, operation: &str) -> Result<Option<LockGuard<'a>>> {
    let Some(service) = ctx.lock_service() else {
        warn!(target: "schemata::pipeline", operation, "No lock service, running without lock");
        return Ok(None);
    };
    ctx.cancellation().check("lock acquisition")?;
    let timeout = lock_timeout(ctx)?;
    match LockGuard::try_acquire(service.as_ref(), timeout)? {
        Some(guard) => {
            debug!(target: "schemata::pipeline", operation, lock_id = service.lock_id(), "Lock acquired");
            Ok(Some(guard))
        }
        None => {
            let record = service.get_lock()?;
            Err(Error::LockUnavailable {
                holder: record.lock_id.unwrap_or_else(|| "unknown".to_string()),
                expiration: record
                    .expiration
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string()),
            })
        }
    }
}

/// Re-enter the lock held by `held` for one step of a long run
///
/// Re-entry renews the lease once a quarter of its TTL has passed, so a run
/// longer than the TTL keeps ownership. A lease taken over meanwhile fails
/// with `LockLost`.
pub(crate) fn renew_lock<'a>(
    ctx: &'a CommandContext,
    held: &Option<LockGuard<'a>>,
) -> Result<Option<LockGuard<'a>>> {
    let (Some(_), Some(service)) = (held, ctx.lock_service()) else {
        return Ok(None);
    };
    let timeout = lock_timeout(ctx)?;
    match LockGuard::try_acquire(service.as_ref(), timeout)? {
        Some(guard) => Ok(Some(guard)),
        None => Err(Error::Timeout(format!(
            "re-entering lock '{}' waited {:?}",
            service.lock_id(),
            timeout
        ))),
    }
}

fn lock_timeout(ctx: &CommandContext) -> Result<Duration> {
    let default_millis = DEFAULT_LOCK_TIMEOUT.as_millis() as u64;
    Ok(Duration::from_millis(
        ctx.require_configuration()?
            .get_u64(LOCK_TIMEOUT_KEY, default_millis)?,
    ))
}
