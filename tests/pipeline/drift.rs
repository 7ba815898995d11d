//! Drift detection after applied files change

use crate::common::Project;
use schemata::{ApplyCommand, ValidateCommand, ValidationFailure};

#[test]
fn test_validate_reports_each_drifted_file() {
    let project = Project::new();
    project.write_change("001.a.apply.app.sql", "CREATE TABLE a (x);");
    project.write_change("002.b.apply.app.sql", "CREATE TABLE b (x);");
    project.write_change("003.c.apply.app.sql", "CREATE TABLE c (x);");
    project.run("DEV", &ApplyCommand).unwrap();

    let report = project.run("DEV", &ValidateCommand).unwrap();
    assert!(report.is_valid());
    assert_eq!(report.checked, 3);

    project.write_change("002.b.apply.app.sql", "CREATE TABLE b (x, y);");
    let report = project.run("DEV", &ValidateCommand).unwrap();
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        ValidationFailure::HashMismatch { id, expected, actual } => {
            assert_eq!(id, "002.b.apply.app.sql");
            assert_ne!(expected, actual);
        }
        other => panic!("unexpected failure: {other}"),
    }

    std::fs::remove_file(project.changes().join("003.c.apply.app.sql")).unwrap();
    let report = project.run("DEV", &ValidateCommand).unwrap();
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[1].id(), "003.c.apply.app.sql");
    assert!(matches!(report.failures[1], ValidationFailure::MissingFile { .. }));
}
