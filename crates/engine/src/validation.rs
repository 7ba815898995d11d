//! Drift detection results
//!
//! Validation never stops at the first problem: every state record is
//! checked and each problem becomes one [`ValidationFailure`].

use std::fmt;
use std::path::PathBuf;

/// One problem found while validating applied changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The state record carries no hash
    MissingHash {
        /// Stringified change file id
        id: String,
    },
    /// The applied file no longer exists
    MissingFile {
        /// Stringified change file id
        id: String,
        /// Where the file was expected
        path: PathBuf,
    },
    /// The file changed after it was applied
    HashMismatch {
        /// Stringified change file id
        id: String,
        /// Hash recorded at apply time
        expected: String,
        /// Hash of the current file
        actual: String,
    },
    /// The recorded id does not follow the naming grammar
    UnparseableId {
        /// Recorded id
        id: String,
        /// Parser message
        reason: String,
    },
}

impl ValidationFailure {
    /// Id of the offending record
    pub fn id(&self) -> &str {
        match self {
            ValidationFailure::MissingHash { id }
            | ValidationFailure::MissingFile { id, .. }
            | ValidationFailure::HashMismatch { id, .. }
            | ValidationFailure::UnparseableId { id, .. } => id,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::MissingHash { id } => write!(f, "{}: no hash recorded", id),
            ValidationFailure::MissingFile { id, path } => {
                write!(f, "{}: file not found at {}", id, path.display())
            }
            ValidationFailure::HashMismatch { id, expected, actual } => write!(
                f,
                "{}: file changed since it was applied (recorded {}, now {})",
                id, expected, actual
            ),
            ValidationFailure::UnparseableId { id, reason } => {
                write!(f, "{}: unparseable id ({})", id, reason)
            }
        }
    }
}

/// Outcome of validating every state record of one environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Number of records checked
    pub checked: usize,
    /// Problems found, in record order
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    /// True if no problem was found
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} checked, {} failed", self.checked, self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_lists_failures() {
        let report = ValidationReport {
            checked: 3,
            failures: vec![
                ValidationFailure::MissingHash { id: "a".into() },
                ValidationFailure::HashMismatch {
                    id: "b".into(),
                    expected: "11".into(),
                    actual: "22".into(),
                },
            ],
        };
        assert!(!report.is_valid());
        let text = report.to_string();
        assert!(text.starts_with("3 checked, 2 failed"));
        assert!(text.contains("a: no hash recorded"));
        assert!(text.contains("recorded 11, now 22"));
        assert_eq!(report.failures[1].id(), "b");
    }
}
