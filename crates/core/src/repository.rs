//! Repository interfaces for external state
//!
//! The engine never talks to a store directly. Lock and state persistence go
//! through these narrow traits so any store with conditional-update semantics
//! can back them (see `schemata-storage` for the in-memory and SQLite
//! implementations).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::environment::Environment;
use crate::error::Result;
use crate::records::{LockRecord, StateRecord};

/// Store for the single distributed lock row
///
/// Every mutating method is a compare-and-swap and reports whether the row
/// was updated.
pub trait LockStateRepository: Send + Sync {
    /// Set owner and expiration if the row has no owner or its expiration is
    /// at or before `now`
    fn update_id_and_expiration_if_owner_is_null_or_expiration_is_reached(
        &self,
        lock_id: &str,
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Extend the expiration if `lock_id` still owns the row
    fn update_lock_expiration(&self, lock_id: &str, expiration: DateTime<Utc>) -> Result<bool>;

    /// Clear the owner if `lock_id` still owns the row
    fn update_id_to_null(&self, lock_id: &str) -> Result<bool>;

    /// Current row
    fn get_lock_record(&self) -> Result<LockRecord>;
}

/// Store for applied-change records of one environment
pub trait StateRepository: Send + Sync {
    /// Insert or replace the record for `record.change_file_id`
    fn save(&self, record: StateRecord) -> Result<()>;

    /// Remove the record for `change_file_id`; returns whether one existed
    fn delete(&self, change_file_id: &str) -> Result<bool>;

    /// All records
    fn find_all(&self) -> Result<Vec<StateRecord>>;
}

/// Hands out repositories to the service layer
pub trait RepositoryProvider: Send + Sync {
    /// State repository scoped to `environment`
    fn state_repository(&self, environment: &Environment) -> Result<Arc<dyn StateRepository>>;

    /// Lock repository, or `None` when the store has no lock support
    fn lock_repository(&self) -> Result<Option<Arc<dyn LockStateRepository>>>;
}
