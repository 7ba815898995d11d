//! Multi-holder lock tests
//!
//! Several `DatabaseLockService` instances share one lock row, the way
//! separate processes share one database. These verify:
//!
//! 1. **Exclusion** - exactly one of N racing holders acquires
//! 2. **Hand-over** - release lets the next holder in
//! 3. **Persistence** - exclusion holds through a SQLite file opened twice

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use schemata_concurrency::{DatabaseLockService, LockGuard, LockService};
use schemata_core::LockStateRepository;
use schemata_storage::{MemoryLockStateRepository, SqliteStore};
use tempfile::TempDir;

const TTL: Duration = Duration::from_secs(60);
const WAIT: Duration = Duration::from_millis(200);

fn race(services: Vec<Arc<DatabaseLockService>>) -> usize {
    let barrier = Arc::new(Barrier::new(services.len()));
    let winners = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = services
        .into_iter()
        .map(|service| {
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                barrier.wait();
                if service.try_lock(WAIT).unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    winners.load(Ordering::SeqCst)
}

#[test]
fn test_exactly_one_of_many_holders_wins() {
    let repo: Arc<dyn LockStateRepository> = Arc::new(MemoryLockStateRepository::new());
    let services: Vec<_> = (0..8)
        .map(|_| Arc::new(DatabaseLockService::new(Arc::clone(&repo), TTL).unwrap()))
        .collect();
    assert_eq!(race(services.clone()), 1);

    let holder = services
        .iter()
        .find(|s| s.hold_count() == 1)
        .unwrap();
    assert_eq!(
        repo.get_lock_record().unwrap().lock_id.as_deref(),
        Some(holder.lock_id())
    );
}

#[test]
fn test_release_hands_over() {
    let repo: Arc<dyn LockStateRepository> = Arc::new(MemoryLockStateRepository::new());
    let first = DatabaseLockService::new(Arc::clone(&repo), TTL).unwrap();
    let second = DatabaseLockService::new(Arc::clone(&repo), TTL).unwrap();

    {
        let _guard = LockGuard::try_acquire(&first, WAIT).unwrap().unwrap();
        assert!(LockGuard::try_acquire(&second, WAIT).unwrap().is_none());
    }
    let guard = LockGuard::try_acquire(&second, WAIT).unwrap();
    assert!(guard.is_some());
    assert_eq!(
        second.get_lock().unwrap().lock_id.as_deref(),
        Some(second.lock_id())
    );
}

#[test]
fn test_sqlite_file_excludes_second_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lock.db");
    let services: Vec<_> = (0..4)
        .map(|_| {
            let store = SqliteStore::open(&path).unwrap();
            Arc::new(DatabaseLockService::new(Arc::new(store.lock()), TTL).unwrap())
        })
        .collect();
    assert_eq!(race(services.clone()), 1);

    for service in &services {
        if service.hold_count() == 1 {
            service.unlock().unwrap();
        }
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.lock().get_lock_record().unwrap().lock_id, None);
}
