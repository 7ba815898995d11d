//! SQLite repositories
//!
//! Two tables back the repository traits:
//!
//! ```sql
//! schemata_lock(id INTEGER PRIMARY KEY CHECK(id = 1), lock_id TEXT, expiration_millis INTEGER)
//! schemata_state(environment TEXT, change_file_id TEXT, file_hash TEXT,
//!                apply_timestamp_millis INTEGER, applied_by TEXT,
//!                PRIMARY KEY(environment, change_file_id))
//! ```
//!
//! Every lock mutation is a single conditional `UPDATE`, so the
//! compare-and-swap holds across processes sharing the database file.
//! Timestamps are stored as Unix milliseconds.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use schemata_core::{
    Environment, Error, LockRecord, LockStateRepository, RepositoryProvider, Result, StateRecord,
    StateRepository,
};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schemata_lock (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    lock_id TEXT,
    expiration_millis INTEGER
);
INSERT OR IGNORE INTO schemata_lock (id, lock_id, expiration_millis) VALUES (1, NULL, NULL);
CREATE TABLE IF NOT EXISTS schemata_state (
    environment TEXT NOT NULL,
    change_file_id TEXT NOT NULL,
    file_hash TEXT,
    apply_timestamp_millis INTEGER NOT NULL,
    applied_by TEXT NOT NULL,
    PRIMARY KEY (environment, change_file_id)
);
";

/// How long a writer waits on another process's transaction
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type SharedConnection = Arc<Mutex<Connection>>;

fn storage_error(context: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::storage(format!("{}: {}", context, e))
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::storage(format!("timestamp out of range: {}", millis)))
}

/// SQLite-backed lock row
#[derive(Debug, Clone)]
pub struct SqliteLockStateRepository {
    conn: SharedConnection,
}

impl LockStateRepository for SqliteLockStateRepository {
    fn update_id_and_expiration_if_owner_is_null_or_expiration_is_reached(
        &self,
        lock_id: &str,
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let updated = self
            .conn
            .lock()
            .execute(
                "UPDATE schemata_lock SET lock_id = ?1, expiration_millis = ?2
                 WHERE id = 1 AND (lock_id IS NULL OR expiration_millis <= ?3)",
                params![lock_id, expiration.timestamp_millis(), now.timestamp_millis()],
            )
            .map_err(storage_error("failed to acquire lock row"))?;
        Ok(updated == 1)
    }

    fn update_lock_expiration(&self, lock_id: &str, expiration: DateTime<Utc>) -> Result<bool> {
        let updated = self
            .conn
            .lock()
            .execute(
                "UPDATE schemata_lock SET expiration_millis = ?2 WHERE id = 1 AND lock_id = ?1",
                params![lock_id, expiration.timestamp_millis()],
            )
            .map_err(storage_error("failed to renew lock row"))?;
        Ok(updated == 1)
    }

    fn update_id_to_null(&self, lock_id: &str) -> Result<bool> {
        let updated = self
            .conn
            .lock()
            .execute(
                "UPDATE schemata_lock SET lock_id = NULL WHERE id = 1 AND lock_id = ?1",
                params![lock_id],
            )
            .map_err(storage_error("failed to release lock row"))?;
        Ok(updated == 1)
    }

    fn get_lock_record(&self) -> Result<LockRecord> {
        let row: Option<(Option<String>, Option<i64>)> = self
            .conn
            .lock()
            .query_row(
                "SELECT lock_id, expiration_millis FROM schemata_lock WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(storage_error("failed to read lock row"))?;
        let Some((lock_id, expiration)) = row else {
            return Ok(LockRecord::default());
        };
        Ok(LockRecord {
            lock_id,
            expiration: expiration.map(from_millis).transpose()?,
        })
    }
}

/// SQLite-backed state records of one environment
#[derive(Debug, Clone)]
pub struct SqliteStateRepository {
    conn: SharedConnection,
    environment: String,
}

impl StateRepository for SqliteStateRepository {
    fn save(&self, record: StateRecord) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO schemata_state
                 (environment, change_file_id, file_hash, apply_timestamp_millis, applied_by)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.environment,
                    record.change_file_id,
                    record.file_hash,
                    record.apply_timestamp.timestamp_millis(),
                    record.applied_by,
                ],
            )
            .map_err(storage_error("failed to save state record"))?;
        Ok(())
    }

    fn delete(&self, change_file_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .lock()
            .execute(
                "DELETE FROM schemata_state WHERE environment = ?1 AND change_file_id = ?2",
                params![self.environment, change_file_id],
            )
            .map_err(storage_error("failed to delete state record"))?;
        Ok(deleted > 0)
    }

    fn find_all(&self) -> Result<Vec<StateRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT change_file_id, file_hash, apply_timestamp_millis, applied_by
                 FROM schemata_state WHERE environment = ?1 ORDER BY change_file_id",
            )
            .map_err(storage_error("failed to prepare state query"))?;
        let rows = stmt
            .query_map(params![self.environment], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(storage_error("failed to query state records"))?;

        let mut records = Vec::new();
        for row in rows {
            let (change_file_id, file_hash, millis, applied_by) =
                row.map_err(storage_error("failed to read state record"))?;
            records.push(StateRecord {
                change_file_id,
                file_hash,
                apply_timestamp: from_millis(millis)?,
                applied_by,
            });
        }
        Ok(records)
    }
}

/// SQLite [`RepositoryProvider`]
///
/// One connection is shared by the lock row and every environment's state
/// repository.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: SharedConnection,
}

impl SqliteStore {
    /// Open (creating if needed) a database file and ensure the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            Error::storage(format!("failed to open '{}': {}", path.display(), e))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(storage_error("failed to set busy timeout"))?;
        let store = Self::init(conn)?;
        debug!(target: "schemata::storage", path = %path.display(), "SQLite store opened");
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(storage_error("failed to open in-memory database"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(storage_error("failed to apply schema"))?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock repository backed by this store
    pub fn lock(&self) -> SqliteLockStateRepository {
        SqliteLockStateRepository {
            conn: Arc::clone(&self.conn),
        }
    }

    /// State repository for `environment`
    pub fn state(&self, environment: &str) -> SqliteStateRepository {
        SqliteStateRepository {
            conn: Arc::clone(&self.conn),
            environment: environment.to_string(),
        }
    }
}

impl RepositoryProvider for SqliteStore {
    fn state_repository(&self, environment: &Environment) -> Result<Arc<dyn StateRepository>> {
        Ok(Arc::new(self.state(environment.name())))
    }

    fn lock_repository(&self) -> Result<Option<Arc<dyn LockStateRepository>>> {
        Ok(Some(Arc::new(self.lock())))
    }
}
