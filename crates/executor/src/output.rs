//! Reports returned by the built-in commands
//!
//! Every report is plain data and serializes with `serde`, so drivers can
//! print it or emit it as structured output.

use std::fmt;

use serde::Serialize;

use schemata_core::StateRecord;

/// Outcome of [`ApplyCommand`](crate::ApplyCommand)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Environment applied to
    pub environment: String,
    /// Ids applied by this run, in execution order
    pub applied: Vec<String>,
    /// Applicable changes skipped because they were already recorded
    pub already_applied: usize,
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} applied, {} already applied",
            self.environment,
            self.applied.len(),
            self.already_applied
        )?;
        for id in &self.applied {
            write!(f, "\n  + {}", id)?;
        }
        Ok(())
    }
}

/// Outcome of [`RevertCommand`](crate::RevertCommand)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    /// Environment reverted in
    pub environment: String,
    /// Ids of the applied changes undone, most recent first
    pub reverted: Vec<String>,
}

impl fmt::Display for RevertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} reverted", self.environment, self.reverted.len())?;
        for id in &self.reverted {
            write!(f, "\n  - {}", id)?;
        }
        Ok(())
    }
}

/// Outcome of [`StatusCommand`](crate::StatusCommand)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Environment inspected
    pub environment: String,
    /// Recorded applies
    pub applied: Vec<StateRecord>,
    /// Applicable apply files not yet recorded, in apply order
    pub pending: Vec<String>,
}

impl StatusReport {
    /// True when nothing is waiting to be applied
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} applied, {} pending",
            self.environment,
            self.applied.len(),
            self.pending.len()
        )?;
        for record in &self.applied {
            write!(
                f,
                "\n  applied {} ({} by {})",
                record.change_file_id,
                record.apply_timestamp.to_rfc3339(),
                record.applied_by
            )?;
        }
        for id in &self.pending {
            write!(f, "\n  pending {}", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_report_display() {
        let report = ApplyReport {
            environment: "DEV".into(),
            applied: vec!["001.a.apply.main.sql".into()],
            already_applied: 2,
        };
        assert_eq!(
            report.to_string(),
            "DEV: 1 applied, 2 already applied\n  + 001.a.apply.main.sql"
        );
    }

    #[test]
    fn test_status_up_to_date() {
        let mut report = StatusReport::default();
        assert!(report.is_up_to_date());
        report.pending.push("002.b.apply.main.sql".into());
        assert!(!report.is_up_to_date());
        assert!(report.to_string().ends_with("pending 002.b.apply.main.sql"));
    }
}
