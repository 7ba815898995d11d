//! Applied-change bookkeeping
//!
//! The state service records each applied change together with the
//! SHA-256 of the file at apply time, removes the record again when the
//! change is reverted, and compares records against the files on disk to
//! detect drift.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use schemata_core::{
    ChangeFile, ChangeFileFactory, ChangeType, Configuration, Result, StateRecord, StateRepository,
};

use crate::validation::{ValidationFailure, ValidationReport};

/// Configuration key overriding the recorded `applied_by`
pub const APPLIED_BY_KEY: &str = "state.applied-by";

/// Lowercase hex SHA-256 of a file's content
pub fn file_hash(path: &Path) -> io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

fn default_applied_by() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Records completions and validates them later
pub struct StateService {
    repository: Arc<dyn StateRepository>,
    factory: ChangeFileFactory,
    applied_by: String,
}

impl StateService {
    /// Service over `repository`
    pub fn new(
        repository: Arc<dyn StateRepository>,
        factory: ChangeFileFactory,
        applied_by: impl Into<String>,
    ) -> Self {
        StateService {
            repository,
            factory,
            applied_by: applied_by.into(),
        }
    }

    /// Service reading `state.applied-by` and `changes.max-path-length`
    pub fn from_configuration(repository: Arc<dyn StateRepository>, config: &Configuration) -> Result<Self> {
        let applied_by = match config.get(APPLIED_BY_KEY).filter(|v| !v.trim().is_empty()) {
            Some(value) => value.to_string(),
            None => default_applied_by(),
        };
        Ok(Self::new(
            repository,
            ChangeFileFactory::from_configuration(config)?,
            applied_by,
        ))
    }

    /// Name recorded as `applied_by`
    pub fn applied_by(&self) -> &str {
        &self.applied_by
    }

    /// Record that `change_file` completed
    ///
    /// An apply stores a record with the file hash. A revert deletes the
    /// record of its apply counterpart.
    pub fn register_completion(&self, change_file: &dyn ChangeFile) -> Result<()> {
        let id = change_file.id();
        match id.change_type() {
            Some(ChangeType::Apply) => {
                let record = StateRecord {
                    change_file_id: id.to_string(),
                    file_hash: Some(file_hash(change_file.file())?),
                    apply_timestamp: Utc::now(),
                    applied_by: self.applied_by.clone(),
                };
                debug!(target: "schemata::state", change = %id, hash = ?record.file_hash, "Recording apply");
                self.repository.save(record)
            }
            Some(ChangeType::Revert) => {
                let mut removed = false;
                for record in self.repository.find_all()? {
                    let Ok(applied) = self.factory.parse(&record.change_file_id) else {
                        continue;
                    };
                    if applied.change_type() == Some(ChangeType::Apply) && applied.is_counterpart_of(id) {
                        removed |= self.repository.delete(&record.change_file_id)?;
                    }
                }
                if removed {
                    info!(target: "schemata::state", change = %id, "Recorded revert");
                } else {
                    warn!(target: "schemata::state", change = %id, "Reverted change had no applied record");
                }
                Ok(())
            }
            None => {
                warn!(target: "schemata::state", change = %id, "Change without a type is not recorded");
                Ok(())
            }
        }
    }

    /// Every record of this environment
    pub fn get_state_records(&self) -> Result<Vec<StateRecord>> {
        self.repository.find_all()
    }

    /// Stringified ids of every applied change
    pub fn applied_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .repository
            .find_all()?
            .into_iter()
            .map(|record| record.change_file_id)
            .collect())
    }

    /// Compare every record with the file currently under `changes_directory`
    pub fn validate(&self, changes_directory: &Path) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        for record in self.repository.find_all()? {
            report.checked += 1;
            if let Some(failure) = self.check(&record, changes_directory)? {
                debug!(target: "schemata::state", %failure, "Validation failure");
                report.failures.push(failure);
            }
        }
        Ok(report)
    }

    fn check(&self, record: &StateRecord, changes_directory: &Path) -> Result<Option<ValidationFailure>> {
        let id = record.change_file_id.clone();
        let parsed = match self.factory.parse(&record.change_file_id) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Ok(Some(ValidationFailure::UnparseableId {
                    id,
                    reason: e.to_string(),
                }))
            }
        };
        let Some(expected) = record.hash() else {
            return Ok(Some(ValidationFailure::MissingHash { id }));
        };
        let path = changes_directory.join(parsed.relative_path());
        let actual = match file_hash(&path) {
            Ok(actual) => actual,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Some(ValidationFailure::MissingFile { id, path }))
            }
            Err(e) => return Err(e.into()),
        };
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Ok(Some(ValidationFailure::HashMismatch {
                id,
                expected: expected.to_string(),
                actual,
            }));
        }
        Ok(None)
    }
}

impl fmt::Debug for StateService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateService")
            .field("applied_by", &self.applied_by)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_storage::MemoryStateRepository;
    use tempfile::TempDir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn service() -> (StateService, Arc<MemoryStateRepository>) {
        let repo = Arc::new(MemoryStateRepository::new());
        (StateService::new(repo.clone(), ChangeFileFactory::new(), "tester"), repo)
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_file_hash_known_value() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "empty", "");
        assert_eq!(file_hash(&dir.path().join("empty")).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn test_apply_records_hash_and_revert_deletes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "001.init.apply.main.sql", "CREATE TABLE t (x);");
        write(dir.path(), "001.init.revert.ops.sh", "echo undo");
        let factory = ChangeFileFactory::new();
        let apply = factory.create_apply_file(dir.path(), "001.init.apply.main.sql").unwrap();
        let revert = factory.create_revert_file(dir.path(), "001.init.revert.ops.sh").unwrap();
        let (service, repo) = service();

        service.register_completion(&apply).unwrap();
        let records = repo.find_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].change_file_id, "001.init.apply.main.sql");
        assert_eq!(records[0].applied_by, "tester");
        assert_eq!(records[0].file_hash.as_deref().map(str::len), Some(64));
        assert!(service.applied_ids().unwrap().contains("001.init.apply.main.sql"));

        service.register_completion(&revert).unwrap();
        assert!(service.get_state_records().unwrap().is_empty());
    }

    #[test]
    fn test_revert_without_record_is_harmless() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "002.x.revert.main.sql", "DROP TABLE x;");
        let revert = ChangeFileFactory::new()
            .create_revert_file(dir.path(), "002.x.revert.main.sql")
            .unwrap();
        let (service, _) = service();
        service.register_completion(&revert).unwrap();
    }

    #[test]
    fn test_validate_reports_each_problem_and_continues() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "001.a.apply.main.sql", "A");
        write(dir.path(), "002.b.apply.main.sql", "B");
        write(dir.path(), "003.c.apply.main.sql", "C");
        let factory = ChangeFileFactory::new();
        let (service, repo) = service();
        for name in ["001.a.apply.main.sql", "002.b.apply.main.sql", "003.c.apply.main.sql"] {
            service
                .register_completion(&factory.create_apply_file(dir.path(), name).unwrap())
                .unwrap();
        }
        assert!(service.validate(dir.path()).unwrap().is_valid());

        // Drift in the middle file only
        write(dir.path(), "002.b.apply.main.sql", "B changed");
        let report = service.validate(dir.path()).unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            ValidationFailure::HashMismatch { id, .. } if id == "002.b.apply.main.sql"
        ));

        std::fs::remove_file(dir.path().join("003.c.apply.main.sql")).unwrap();
        repo.save(StateRecord {
            change_file_id: "004.d.apply.main.sql".into(),
            file_hash: Some("  ".into()),
            apply_timestamp: Utc::now(),
            applied_by: "x".into(),
        })
        .unwrap();
        repo.save(StateRecord {
            change_file_id: "not-a-change".into(),
            file_hash: Some("00".into()),
            apply_timestamp: Utc::now(),
            applied_by: "x".into(),
        })
        .unwrap();

        let report = service.validate(dir.path()).unwrap();
        assert_eq!(report.checked, 5);
        assert_eq!(report.failures.len(), 4);
        assert!(report.failures.iter().any(|f| matches!(f, ValidationFailure::MissingFile { id, .. } if id == "003.c.apply.main.sql")));
        assert!(report.failures.iter().any(|f| matches!(f, ValidationFailure::MissingHash { id } if id == "004.d.apply.main.sql")));
        assert!(report.failures.iter().any(|f| matches!(f, ValidationFailure::UnparseableId { id, .. } if id == "not-a-change")));
    }

    #[test]
    fn test_applied_by_from_configuration() {
        let repo = Arc::new(MemoryStateRepository::new());
        let config = Configuration::new().with(APPLIED_BY_KEY, "ci-bot");
        let service = StateService::from_configuration(repo.clone(), &config).unwrap();
        assert_eq!(service.applied_by(), "ci-bot");

        let service = StateService::from_configuration(repo, &Configuration::new()).unwrap();
        assert!(!service.applied_by().is_empty());
    }
}
