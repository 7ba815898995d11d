//! Persisted record shapes
//!
//! These are the rows the engine expects its external stores to keep:
//!
//! - lock record: `{lock_id, expiration}` (single logical row)
//! - state record: `{change_file_id, file_hash, apply_timestamp, applied_by}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successfully applied change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Stringified change file id (its relative path)
    pub change_file_id: String,
    /// Lowercase hex SHA-256 of the file content at apply time
    pub file_hash: Option<String>,
    /// When the change was applied
    pub apply_timestamp: DateTime<Utc>,
    /// Who applied it
    pub applied_by: String,
}

impl StateRecord {
    /// Recorded hash, if present and non-blank
    pub fn hash(&self) -> Option<&str> {
        self.file_hash
            .as_deref()
            .filter(|hash| !hash.trim().is_empty())
    }
}

/// The distributed lock row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Holder token; `None` when free
    pub lock_id: Option<String>,
    /// Lease expiration
    pub expiration: Option<DateTime<Utc>>,
}

impl LockRecord {
    /// True if a holder is recorded whose lease has not expired at `now`
    pub fn is_held_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.lock_id, self.expiration) {
            (Some(_), Some(expiration)) => expiration > now,
            (Some(_), None) => true,
            _ => false,
        }
    }
}
