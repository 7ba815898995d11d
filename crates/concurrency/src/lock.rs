//! Renewable reentrant lease lock
//!
//! A single external lock row (`LockRecord`) is shared by every process that
//! runs changes against the same target. A holder owns the row while its
//! `lock_id` is recorded and the expiration lies in the future.
//!
//! ## State machine
//!
//! ```text
//! UNHELD (count 0) --try_lock, CAS succeeds--> HELD (count 1)
//! UNHELD           --try_lock, CAS fails-----> UNHELD, Ok(false)
//! HELD (n)         --try_lock----------------> HELD (n + 1), renewing the
//!                                              lease when more than TTL/4
//!                                              has passed since last write
//! HELD (n > 1)     --unlock------------------> HELD (n - 1)
//! HELD (1)         --unlock------------------> UNHELD, owner cleared
//! UNHELD           --unlock------------------> IllegalLockState
//! ```
//!
//! A renewal that finds the row owned by someone else fails with `LockLost`
//! and leaves the count untouched. Cross-process exclusion comes entirely
//! from the conditional updates; the local count only avoids redundant
//! writes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use schemata_core::{Configuration, Error, LockRecord, LockStateRepository, Result};

use crate::clock::{Clock, SystemClock};

/// Configuration key enabling the lock service
pub const LOCK_ENABLED_KEY: &str = "lock.enabled";
/// Configuration key for the lease TTL in seconds
pub const LOCK_TTL_KEY: &str = "lock.ttl-seconds";
/// Configuration key for the local wait used by commands, in milliseconds
pub const LOCK_TIMEOUT_KEY: &str = "lock.timeout-millis";

/// Default lease TTL
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);
/// Default local wait used by commands
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Reentrant mutual exclusion across processes
pub trait LockService: Send + Sync {
    /// Token identifying this holder in the lock row
    fn lock_id(&self) -> &str;

    /// Acquire (or re-enter) the lock
    ///
    /// `timeout` bounds the wait for local serialization only. Returns
    /// `Ok(false)` when the wait elapses or another holder owns the row.
    fn try_lock(&self, timeout: Duration) -> Result<bool>;

    /// Release one level; the last release clears the external owner
    fn unlock(&self) -> Result<()>;

    /// Current external lock row
    fn get_lock(&self) -> Result<LockRecord>;
}

#[derive(Debug, Default)]
struct HoldState {
    count: u32,
    /// Expiration last written to the row
    expiration: Option<DateTime<Utc>>,
}

/// [`LockService`] over a [`LockStateRepository`]
pub struct DatabaseLockService {
    repository: Arc<dyn LockStateRepository>,
    lock_id: String,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<HoldState>,
    /// Bound on the local wait in `unlock`
    unlock_timeout: Duration,
}

impl DatabaseLockService {
    /// Create a service with a fresh random lock id and the wall clock
    pub fn new(repository: Arc<dyn LockStateRepository>, ttl: Duration) -> Result<Self> {
        Self::with_clock(repository, ttl, Arc::new(SystemClock))
    }

    /// Create a service with an explicit clock
    pub fn with_clock(
        repository: Arc<dyn LockStateRepository>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if ttl.is_zero() {
            return Err(Error::configuration("lock TTL must be positive"));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::configuration(format!("lock TTL out of range: {}", e)))?;
        Ok(DatabaseLockService {
            repository,
            lock_id: Uuid::new_v4().to_string(),
            ttl,
            clock,
            state: Mutex::new(HoldState::default()),
            unlock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Bound the local wait in `unlock`
    pub fn with_unlock_timeout(mut self, timeout: Duration) -> Self {
        self.unlock_timeout = timeout;
        self
    }

    /// Create a service reading `lock.ttl-seconds`
    pub fn from_configuration(
        repository: Arc<dyn LockStateRepository>,
        config: &Configuration,
    ) -> Result<Self> {
        let ttl = config.get_duration_secs(LOCK_TTL_KEY, DEFAULT_LOCK_TTL)?;
        Self::new(repository, ttl)
    }

    /// Current reentrancy depth
    pub fn hold_count(&self) -> u32 {
        self.state.lock().count
    }

    fn acquire(&self, state: &mut HoldState) -> Result<bool> {
        let now = self.clock.now();
        let expiration = now + self.ttl;
        let acquired = self
            .repository
            .update_id_and_expiration_if_owner_is_null_or_expiration_is_reached(
                &self.lock_id,
                expiration,
                now,
            )?;
        if acquired {
            state.count = 1;
            state.expiration = Some(expiration);
            info!(target: "schemata::lock", lock_id = %self.lock_id, %expiration, "Lock acquired");
        } else {
            debug!(target: "schemata::lock", lock_id = %self.lock_id, "Lock held by another holder");
        }
        Ok(acquired)
    }

    fn reenter(&self, state: &mut HoldState) -> Result<bool> {
        let now = self.clock.now();
        let renew = match state.expiration {
            Some(expiration) => now - (expiration - self.ttl) > self.ttl / 4,
            None => true,
        };
        if renew {
            let expiration = now + self.ttl;
            if !self.repository.update_lock_expiration(&self.lock_id, expiration)? {
                warn!(target: "schemata::lock", lock_id = %self.lock_id, "Lease lost during renewal");
                return Err(Error::LockLost {
                    lock_id: self.lock_id.clone(),
                });
            }
            state.expiration = Some(expiration);
            debug!(target: "schemata::lock", lock_id = %self.lock_id, %expiration, "Lease renewed");
        }
        state.count += 1;
        Ok(true)
    }
}

impl LockService for DatabaseLockService {
    fn lock_id(&self) -> &str {
        &self.lock_id
    }

    fn try_lock(&self, timeout: Duration) -> Result<bool> {
        let Some(mut state) = self.state.try_lock_for(timeout) else {
            debug!(target: "schemata::lock", ?timeout, "Timed out waiting for local lock");
            return Ok(false);
        };
        if state.count == 0 {
            self.acquire(&mut state)
        } else {
            self.reenter(&mut state)
        }
    }

    fn unlock(&self) -> Result<()> {
        let Some(mut state) = self.state.try_lock_for(self.unlock_timeout) else {
            return Err(Error::Timeout(format!(
                "unlock of '{}' waited {:?} for the local lock",
                self.lock_id, self.unlock_timeout
            )));
        };
        if state.count == 0 {
            return Err(Error::IllegalLockState(format!(
                "unlock called while '{}' does not hold the lock",
                self.lock_id
            )));
        }
        state.count -= 1;
        if state.count == 0 {
            state.expiration = None;
            if self.repository.update_id_to_null(&self.lock_id)? {
                info!(target: "schemata::lock", lock_id = %self.lock_id, "Lock released");
            } else {
                warn!(target: "schemata::lock", lock_id = %self.lock_id, "Lock was no longer owned at release");
            }
        }
        Ok(())
    }

    fn get_lock(&self) -> Result<LockRecord> {
        self.repository.get_lock_record()
    }
}

impl fmt::Debug for DatabaseLockService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DatabaseLockService")
            .field("lock_id", &self.lock_id)
            .field("ttl", &self.ttl)
            .field("count", &state.count)
            .field("expiration", &state.expiration)
            .finish()
    }
}

/// Holds one level of a [`LockService`] and releases it on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    service: &'a dyn LockService,
}

impl<'a> LockGuard<'a> {
    /// Try to take one level of `service`; `None` when unavailable
    pub fn try_acquire(service: &'a dyn LockService, timeout: Duration) -> Result<Option<Self>> {
        if service.try_lock(timeout)? {
            Ok(Some(LockGuard { service }))
        } else {
            Ok(None)
        }
    }

    /// Release now, reporting errors instead of logging them
    pub fn release(self) -> Result<()> {
        let service = self.service;
        std::mem::forget(self);
        service.unlock()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.service.unlock() {
            warn!(target: "schemata::lock", lock_id = self.service.lock_id(), error = %e, "Failed to release lock");
        }
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock_id", &self.service.lock_id())
            .finish()
    }
}
