//! In-memory repositories
//!
//! Useful for tests and for single-process runs where state need not outlive
//! the process. All compare-and-swap operations happen under one mutex, so
//! they are atomic with respect to each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use schemata_core::{
    Environment, LockRecord, LockStateRepository, RepositoryProvider, Result, StateRecord,
    StateRepository,
};

/// In-memory lock row
#[derive(Debug, Default)]
pub struct MemoryLockStateRepository {
    record: Mutex<LockRecord>,
}

impl MemoryLockStateRepository {
    /// Create a free lock row
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStateRepository for MemoryLockStateRepository {
    fn update_id_and_expiration_if_owner_is_null_or_expiration_is_reached(
        &self,
        lock_id: &str,
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut record = self.record.lock();
        let available = match (&record.lock_id, record.expiration) {
            (None, _) => true,
            (Some(_), Some(current)) => current <= now,
            (Some(_), None) => false,
        };
        if available {
            record.lock_id = Some(lock_id.to_string());
            record.expiration = Some(expiration);
        }
        Ok(available)
    }

    fn update_lock_expiration(&self, lock_id: &str, expiration: DateTime<Utc>) -> Result<bool> {
        let mut record = self.record.lock();
        if record.lock_id.as_deref() == Some(lock_id) {
            record.expiration = Some(expiration);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn update_id_to_null(&self, lock_id: &str) -> Result<bool> {
        let mut record = self.record.lock();
        if record.lock_id.as_deref() == Some(lock_id) {
            record.lock_id = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn get_lock_record(&self) -> Result<LockRecord> {
        Ok(self.record.lock().clone())
    }
}

/// In-memory state records of one environment
#[derive(Debug, Default)]
pub struct MemoryStateRepository {
    records: Mutex<BTreeMap<String, StateRecord>>,
}

impl MemoryStateRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateRepository for MemoryStateRepository {
    fn save(&self, record: StateRecord) -> Result<()> {
        self.records
            .lock()
            .insert(record.change_file_id.clone(), record);
        Ok(())
    }

    fn delete(&self, change_file_id: &str) -> Result<bool> {
        Ok(self.records.lock().remove(change_file_id).is_some())
    }

    fn find_all(&self) -> Result<Vec<StateRecord>> {
        Ok(self.records.lock().values().cloned().collect())
    }
}

/// In-memory [`RepositoryProvider`]
///
/// Hands out one shared lock row and one state repository per environment
/// name; repeated requests for the same environment see the same records.
#[derive(Debug)]
pub struct MemoryStore {
    lock: Option<Arc<MemoryLockStateRepository>>,
    states: Mutex<HashMap<String, Arc<MemoryStateRepository>>>,
}

impl MemoryStore {
    /// Create a store with lock support
    pub fn new() -> Self {
        MemoryStore {
            lock: Some(Arc::new(MemoryLockStateRepository::new())),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Create a store without lock support
    pub fn without_lock() -> Self {
        MemoryStore {
            lock: None,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Direct access to an environment's records
    pub fn state(&self, environment: &str) -> Arc<MemoryStateRepository> {
        self.states
            .lock()
            .entry(environment.to_string())
            .or_default()
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for MemoryStore {
    fn state_repository(&self, environment: &Environment) -> Result<Arc<dyn StateRepository>> {
        Ok(self.state(environment.name()))
    }

    fn lock_repository(&self) -> Result<Option<Arc<dyn LockStateRepository>>> {
        Ok(self
            .lock
            .clone()
            .map(|lock| lock as Arc<dyn LockStateRepository>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cas_on_free_row() {
        let repo = MemoryLockStateRepository::new();
        let now = Utc::now();
        assert!(repo
            .update_id_and_expiration_if_owner_is_null_or_expiration_is_reached("a", now + Duration::seconds(10), now)
            .unwrap());
        assert!(!repo
            .update_id_and_expiration_if_owner_is_null_or_expiration_is_reached("b", now + Duration::seconds(10), now)
            .unwrap());
        assert_eq!(repo.get_lock_record().unwrap().lock_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_cas_after_expiration() {
        let repo = MemoryLockStateRepository::new();
        let now = Utc::now();
        repo.update_id_and_expiration_if_owner_is_null_or_expiration_is_reached("a", now + Duration::seconds(1), now)
            .unwrap();
        let later = now + Duration::seconds(1);
        assert!(repo
            .update_id_and_expiration_if_owner_is_null_or_expiration_is_reached("b", later + Duration::seconds(1), later)
            .unwrap());
        assert_eq!(repo.get_lock_record().unwrap().lock_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_renew_and_clear_require_ownership() {
        let repo = MemoryLockStateRepository::new();
        let now = Utc::now();
        repo.update_id_and_expiration_if_owner_is_null_or_expiration_is_reached("a", now, now)
            .unwrap();
        assert!(!repo.update_lock_expiration("b", now).unwrap());
        assert!(repo.update_lock_expiration("a", now + Duration::seconds(5)).unwrap());
        assert!(!repo.update_id_to_null("b").unwrap());
        assert!(repo.update_id_to_null("a").unwrap());
        assert_eq!(repo.get_lock_record().unwrap().lock_id, None);
    }

    #[test]
    fn test_state_repository() {
        let repo = MemoryStateRepository::new();
        let record = StateRecord {
            change_file_id: "1.a.apply.jdbc.sql".into(),
            file_hash: Some("ab".into()),
            apply_timestamp: Utc::now(),
            applied_by: "me".into(),
        };
        repo.save(record.clone()).unwrap();
        repo.save(record.clone()).unwrap();
        assert_eq!(repo.find_all().unwrap(), vec![record]);
        assert!(repo.delete("1.a.apply.jdbc.sql").unwrap());
        assert!(!repo.delete("1.a.apply.jdbc.sql").unwrap());
    }

    #[test]
    fn test_store_scopes_state_per_environment() {
        let store = MemoryStore::new();
        let dev = store.state_repository(&Environment::new("DEV")).unwrap();
        let prod = store.state_repository(&Environment::new("PROD")).unwrap();
        dev.save(StateRecord {
            change_file_id: "x".into(),
            file_hash: None,
            apply_timestamp: Utc::now(),
            applied_by: "me".into(),
        })
        .unwrap();
        assert_eq!(prod.find_all().unwrap().len(), 0);
        assert_eq!(store.state("DEV").find_all().unwrap().len(), 1);
        assert!(store.lock_repository().unwrap().is_some());
        assert!(MemoryStore::without_lock().lock_repository().unwrap().is_none());
    }
}
