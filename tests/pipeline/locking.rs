//! Lock contention between independent processes sharing one store

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crate::common::Project;
use schemata::{
    ApplyCommand, CommandContext, DatabaseLockService, Environment, Error, LockService,
    RepositoryProvider, SqliteStore,
};

#[test]
fn test_apply_fails_while_another_holder_owns_the_lease() {
    let project = Project::new();
    project.write_change("001.a.apply.app.sql", "CREATE TABLE a (x);");

    let store = SqliteStore::open(&project.dir.path().join("state.db")).unwrap();
    let other = DatabaseLockService::new(
        store.lock_repository().unwrap().unwrap(),
        Duration::from_secs(60),
    )
    .unwrap();
    assert!(other.try_lock(Duration::from_millis(50)).unwrap());

    match project.run("DEV", &ApplyCommand) {
        Err(Error::LockUnavailable { holder, expiration }) => {
            assert_eq!(holder, other.lock_id());
            assert_ne!(expiration, "unknown");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(project.tables("DEV").is_empty());

    other.unlock().unwrap();
    assert_eq!(project.run("DEV", &ApplyCommand).unwrap().applied.len(), 1);
}

#[test]
fn test_racing_processes_apply_each_change_once() {
    let project = Project::new();
    for i in 1..=5 {
        project.write_change(
            &format!("{:03}.t{}.apply.app.sql", i, i),
            &format!("CREATE TABLE t{} (x);", i),
        );
    }

    let runners = 4;
    let barrier = Arc::new(Barrier::new(runners));
    let root = project.dir.path().to_path_buf();
    let handles: Vec<_> = (0..runners)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let root = root.clone();
            thread::spawn(move || {
                let (registry, pipeline) = Project::open(&root);
                barrier.wait();
                let ctx = CommandContext::with_environment(Environment::new("DEV"));
                let result = pipeline.execute(&ctx, &ApplyCommand);
                registry.close();
                result
            })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(report) => applied += report.applied.len(),
            Err(Error::LockUnavailable { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(applied, 5);
    assert_eq!(project.tables("DEV").len(), 5);
}
