//! Apply, status and revert through the standard pipeline

use crate::common::Project;
use schemata::{ApplyCommand, RevertCommand, StatusCommand};

fn project_with_users() -> Project {
    let project = Project::new();
    project.write_change(
        "001.users.apply.app.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );
    project.write_change("001.users.revert.app.sql", "DROP TABLE users;");
    project.write_change(
        "002.seed.apply.app.sql",
        "INSERT INTO users (name) VALUES ('ada');\nINSERT INTO users (name) VALUES ('grace');",
    );
    project.write_change("002.seed.revert.app.sql", "DELETE FROM users;");
    project
}

#[test]
fn test_apply_creates_schema_and_records_state() {
    let project = project_with_users();

    let report = project.run("DEV", &ApplyCommand).unwrap();
    assert_eq!(
        report.applied,
        vec!["001.users.apply.app.sql", "002.seed.apply.app.sql"]
    );
    assert_eq!(project.tables("DEV"), vec!["users"]);
    let count: i64 = project
        .target("DEV")
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);

    let status = project.run("DEV", &StatusCommand).unwrap();
    assert!(status.is_up_to_date());
    assert_eq!(status.applied.len(), 2);
    assert!(status
        .applied
        .iter()
        .all(|record| record.file_hash.as_deref().map(str::len) == Some(64)));
}

#[test]
fn test_second_apply_only_runs_new_changes() {
    let project = project_with_users();
    project.run("DEV", &ApplyCommand).unwrap();

    project.write_change(
        "003.emails.apply.app.sql",
        "ALTER TABLE users ADD COLUMN email TEXT;",
    );
    let status = project.run("DEV", &StatusCommand).unwrap();
    assert_eq!(status.pending, vec!["003.emails.apply.app.sql"]);

    let report = project.run("DEV", &ApplyCommand).unwrap();
    assert_eq!(report.applied, vec!["003.emails.apply.app.sql"]);
    assert_eq!(report.already_applied, 2);
}

#[test]
fn test_revert_then_reapply() {
    let project = project_with_users();
    project.run("DEV", &ApplyCommand).unwrap();

    let report = project.run("DEV", &RevertCommand::new(2)).unwrap();
    assert_eq!(
        report.reverted,
        vec!["002.seed.apply.app.sql", "001.users.apply.app.sql"]
    );
    assert!(project.tables("DEV").is_empty());
    assert_eq!(project.run("DEV", &StatusCommand).unwrap().pending.len(), 2);

    project.run("DEV", &ApplyCommand).unwrap();
    assert_eq!(project.tables("DEV"), vec!["users"]);
}

#[test]
fn test_failed_statement_stops_apply() {
    let project = project_with_users();
    project.write_change("003.broken.apply.app.sql", "INSERT INTO nowhere VALUES (1);");
    project.write_change("004.after.apply.app.sql", "CREATE TABLE after (x);");

    let err = project.run("DEV", &ApplyCommand).unwrap_err();
    assert!(err.to_string().contains("INSERT INTO nowhere"), "{err}");

    let status = project.run("DEV", &StatusCommand).unwrap();
    assert_eq!(status.applied.len(), 2);
    assert_eq!(
        status.pending,
        vec!["003.broken.apply.app.sql", "004.after.apply.app.sql"]
    );
    assert_eq!(project.tables("DEV"), vec!["users"]);
}

#[test]
fn test_nested_directories_keep_their_path() {
    let project = Project::new();
    project.write_change("billing/001.invoices.apply.app.sql", "CREATE TABLE invoices (x);");
    project.write_change("001.core.apply.app.sql", "CREATE TABLE core (x);");

    let report = project.run("DEV", &ApplyCommand).unwrap();
    assert_eq!(
        report.applied,
        vec!["001.core.apply.app.sql", "billing/001.invoices.apply.app.sql"]
    );
}
