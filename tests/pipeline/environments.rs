//! Environment-restricted changes and per-environment configuration

use std::path::PathBuf;

use crate::common::Project;
use schemata::{
    ApplyCommand, ChangeFileFactory, Command, CommandContext, Environment, Error, Result,
};

#[test]
fn test_each_environment_gets_its_own_target_and_state() {
    let project = Project::new();
    project.write_change("001.base.apply.app.sql", "CREATE TABLE base (x);");
    project.write_change("002.audit.PROD.apply.app.sql", "CREATE TABLE audit (x);");
    project.write_change("003.fixtures.DEV.apply.app.sql", "CREATE TABLE fixtures (x);");

    let dev = project.run("DEV", &ApplyCommand).unwrap();
    assert_eq!(dev.applied.len(), 2);
    assert_eq!(project.tables("DEV"), vec!["base", "fixtures"]);

    let prod = project.run("PROD", &ApplyCommand).unwrap();
    assert_eq!(prod.applied.len(), 2);
    assert_eq!(project.tables("PROD"), vec!["audit", "base"]);
}

#[test]
fn test_undeclared_environment_fails_configuration() {
    let project = Project::new();
    project.write_change("001.base.apply.app.sql", "CREATE TABLE base (x);");
    let err = project.run("QA", &ApplyCommand).unwrap_err();
    assert!(matches!(err, Error::Expression(_)), "{err}");
}

/// Runs one file directly through the change service
struct ExecuteOne(&'static str);

impl Command for ExecuteOne {
    type Output = ();

    fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let config = ctx.require_configuration()?;
        let changes = PathBuf::from(config.require("changes.directory")?);
        let file = ctx
            .require_change_file_factory()?
            .create_apply_file(&changes, self.0)?;
        ctx.require_change_service()?.execute(&file, ctx)
    }
}

#[test]
fn test_change_service_rejects_other_environment() {
    let project = Project::new();
    project.write_change("001.audit.PROD.apply.app.sql", "CREATE TABLE audit (x);");

    match project.run("DEV", &ExecuteOne("001.audit.PROD.apply.app.sql")) {
        Err(Error::EnvironmentMismatch { expected, actual, .. }) => {
            assert_eq!(expected, "PROD");
            assert_eq!(actual, "DEV");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    project.run("PROD", &ExecuteOne("001.audit.PROD.apply.app.sql")).unwrap();
}

#[test]
fn test_seeded_context_values_are_kept() {
    let project = Project::new();
    let ctx = CommandContext::with_environment(Environment::new("DEV"));
    ctx.set_change_file_factory(ChangeFileFactory::with_max_path_length(10))
        .unwrap();
    project.write_change("001.long-description.apply.app.sql", "SELECT 1;");

    let err = project.pipeline.execute(&ctx, &ApplyCommand).unwrap_err();
    assert!(matches!(err, Error::PathTooLong { .. }), "{err}");
}
