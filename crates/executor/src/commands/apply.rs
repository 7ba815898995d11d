use tracing::{debug, info};

use schemata_core::{ChangeFile, Result};
use schemata_engine::CommandContext;

use super::{acquire_lock, renew_lock, scan};
use crate::command::Command;
use crate::output::ApplyReport;

/// Applies every pending change of the environment, in order
///
/// Pending means: an apply file whose environment segment is absent or
/// matches, with no state record yet. Each completion is recorded right
/// after its change ran, so a failure part-way leaves the earlier changes
/// recorded and the next run resumes after them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyCommand;

impl Command for ApplyCommand {
    type Output = ApplyReport;

    fn execute(&self, ctx: &CommandContext) -> Result<ApplyReport> {
        let environment = ctx.require_environment()?;
        let state = ctx.require_state_service()?;
        let changes = ctx.require_change_service()?;
        let files = scan(ctx)?;

        let guard = acquire_lock(ctx, "apply")?;
        let recorded = state.applied_ids()?;
        let mut report = ApplyReport {
            environment: environment.name().to_string(),
            ..ApplyReport::default()
        };

        for file in &files.apply_files {
            let id = file.id();
            if !id.applies_to(environment.name()) {
                debug!(target: "schemata::apply", change = %id, "Not for this environment");
                continue;
            }
            if recorded.contains(&id.to_string()) {
                report.already_applied += 1;
                continue;
            }
            ctx.cancellation().check("apply")?;
            let _step = renew_lock(ctx, &guard)?;
            changes.execute(file, ctx)?;
            state.register_completion(file)?;
            info!(target: "schemata::apply", change = %id, environment = environment.name(), "Applied change");
            report.applied.push(id.to_string());
        }

        info!(
            target: "schemata::apply",
            environment = environment.name(),
            applied = report.applied.len(),
            already_applied = report.already_applied,
            "Apply finished"
        );
        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::commands::testing::{write, Fixture};
    use schemata_concurrency::{DatabaseLockService, LockService, DEFAULT_LOCK_TTL};
    use schemata_core::{Environment, Error, LockStateRepository, RepositoryProvider, StateRepository};
    use std::time::Duration;

    #[test]
    fn test_applies_in_order_and_only_once() {
        let fx = Fixture::new();
        fx.change("002.second.apply.main.sh", "two");
        fx.change("001.first.apply.main.sh", "one");
        fx.change("010.tenth.apply.main.sh", "ten");

        let report = fx.run("DEV", &ApplyCommand).unwrap();
        assert_eq!(
            report.applied,
            vec![
                "001.first.apply.main.sh",
                "002.second.apply.main.sh",
                "010.tenth.apply.main.sh"
            ]
        );
        assert_eq!(fx.log(), vec!["one", "two", "ten"]);

        let report = fx.run("DEV", &ApplyCommand).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.already_applied, 3);
        assert_eq!(fx.log().len(), 3);
    }

    #[test]
    fn test_environment_specific_files() {
        let fx = Fixture::new();
        fx.change("001.all.apply.main.sh", "all");
        fx.change("002.prod-only.PROD.apply.main.sh", "prod");
        fx.change("003.dev-only.DEV.apply.main.sh", "dev");

        let report = fx.run("DEV", &ApplyCommand).unwrap();
        assert_eq!(report.applied.len(), 2);
        assert_eq!(fx.log(), vec!["all", "dev"]);
    }

    #[test]
    fn test_failure_keeps_earlier_completions() {
        let fx = Fixture::new();
        fx.change("001.ok.apply.main.sh", "ok");
        write(&fx.changes().join("002.bad.apply.main.sh"), "exit 1\n");
        fx.change("003.later.apply.main.sh", "later");

        assert!(fx.run("DEV", &ApplyCommand).is_err());
        assert_eq!(fx.log(), vec!["ok"]);
        let ids: Vec<_> = fx
            .store
            .state("DEV")
            .find_all()
            .unwrap()
            .into_iter()
            .map(|r| r.change_file_id)
            .collect();
        assert_eq!(ids, vec!["001.ok.apply.main.sh"]);
    }

    #[test]
    fn test_contended_lock_names_holder() {
        let fx = Fixture::new();
        fx.change("001.a.apply.main.sh", "a");
        let other = DatabaseLockService::new(
            fx.store.lock_repository().unwrap().unwrap(),
            DEFAULT_LOCK_TTL,
        )
        .unwrap();
        assert!(other.try_lock(Duration::from_millis(10)).unwrap());

        match fx.run("DEV", &ApplyCommand).unwrap_err() {
            Error::LockUnavailable { holder, .. } => assert_eq!(holder, other.lock_id()),
            e => panic!("unexpected error: {e}"),
        }
        assert!(fx.log().is_empty());

        other.unlock().unwrap();
        assert_eq!(fx.run("DEV", &ApplyCommand).unwrap().applied.len(), 1);
    }

    #[test]
    fn test_runs_unlocked_when_lock_disabled() {
        let fx = Fixture::with_config(|config| config.with("lock.enabled", "false"));
        fx.change("001.a.apply.main.sh", "a");
        let other = DatabaseLockService::new(
            fx.store.lock_repository().unwrap().unwrap(),
            DEFAULT_LOCK_TTL,
        )
        .unwrap();
        assert!(other.try_lock(Duration::from_millis(10)).unwrap());
        assert_eq!(fx.run("DEV", &ApplyCommand).unwrap().applied.len(), 1);
    }

    #[test]
    fn test_lease_renewed_across_long_apply() {
        let fx = Fixture::with_config(|config| config.with("lock.ttl-seconds", "1"));
        for order in 1..=5 {
            write(
                &fx.changes().join(format!("00{order}.slow.apply.main.sh")),
                "sleep 0.4\n",
            );
        }
        let repository = fx.store.lock_repository().unwrap().unwrap();

        let report = std::thread::scope(|scope| {
            let contender = scope.spawn(move || {
                // Past the first lease's expiration, well inside the run
                std::thread::sleep(Duration::from_millis(1500));
                let other = DatabaseLockService::new(repository, DEFAULT_LOCK_TTL).unwrap();
                other.try_lock(Duration::from_millis(10)).unwrap()
            });
            let report = fx.run("DEV", &ApplyCommand);
            assert!(!contender.join().unwrap(), "lease expired while apply was running");
            report
        });
        assert_eq!(report.unwrap().applied.len(), 5);
        let record = fx.store.lock_repository().unwrap().unwrap().get_lock_record().unwrap();
        assert_eq!(record.lock_id, None);
    }

    #[test]
    fn test_cancelled_before_first_change() {
        let fx = Fixture::new();
        fx.change("001.a.apply.main.sh", "a");
        let ctx = CommandContext::with_environment(Environment::new("DEV"));
        ctx.cancellation().cancel();
        let err = fx.pipeline.execute(&ctx, &ApplyCommand).unwrap_err();
        assert!(err.is_interrupted());
        assert!(fx.log().is_empty());
    }

    #[test]
    fn test_requires_environment() {
        let fx = Fixture::new();
        let err = fx
            .pipeline
            .execute(&CommandContext::new(), &ApplyCommand)
            .unwrap_err();
        assert!(matches!(err, Error::ContextValueMissing(_)));
    }
}
