//! Change file identifier

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Direction of a change file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeType {
    /// Moves the target forward
    Apply,
    /// Undoes a previously applied change
    Revert,
}

impl ChangeType {
    /// Lowercase name as it appears in file names
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Apply => "apply",
            ChangeType::Revert => "revert",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("apply") {
            Ok(ChangeType::Apply)
        } else if s.eq_ignore_ascii_case("revert") {
            Ok(ChangeType::Revert)
        } else {
            Err(format!("unknown change type '{}' (expected apply, revert or null)", s))
        }
    }
}

/// Identity of one change file, parsed from its relative path
///
/// Ids are only produced by [`ChangeFileFactory`](super::ChangeFileFactory),
/// which enforces the naming grammar. Equality covers every field; ordering
/// compares the parent directory first and then the numeric order, so
/// `2` sorts before `10` regardless of zero padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    parent_directory: String,
    order: String,
    order_value: u64,
    description: String,
    environment: Option<String>,
    change_type: Option<ChangeType>,
    connector: String,
    extension: String,
}

impl Id {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        parent_directory: String,
        order: String,
        order_value: u64,
        description: String,
        environment: Option<String>,
        change_type: Option<ChangeType>,
        connector: String,
        extension: String,
    ) -> Self {
        Id {
            parent_directory,
            order,
            order_value,
            description,
            environment,
            change_type,
            connector,
            extension,
        }
    }

    /// Parent directory relative to the changes directory, `/`-separated
    pub fn parent_directory(&self) -> &str {
        &self.parent_directory
    }

    /// Order segment exactly as written
    pub fn order(&self) -> &str {
        &self.order
    }

    /// Numeric value of the order segment
    pub fn order_value(&self) -> u64 {
        self.order_value
    }

    /// Description segment
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Environment restriction, if any
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// Change type; `None` when the file name uses the literal `null`
    pub fn change_type(&self) -> Option<ChangeType> {
        self.change_type
    }

    /// Connector name
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// File extension
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// True if this change may run in `environment`
    pub fn applies_to(&self, environment: &str) -> bool {
        match &self.environment {
            Some(declared) => declared == environment,
            None => true,
        }
    }

    /// Rebuild the file name from the parsed segments
    pub fn file_name(&self) -> String {
        let change_type = self.change_type.map_or("null", |t| t.as_str());
        match &self.environment {
            Some(env) => format!(
                "{}.{}.{}.{}.{}.{}",
                self.order, self.description, env, change_type, self.connector, self.extension
            ),
            None => format!(
                "{}.{}.{}.{}.{}",
                self.order, self.description, change_type, self.connector, self.extension
            ),
        }
    }

    /// Path relative to the changes directory, `/`-separated
    pub fn relative_path(&self) -> String {
        if self.parent_directory.is_empty() {
            self.file_name()
        } else {
            format!("{}/{}", self.parent_directory, self.file_name())
        }
    }

    /// True if `other` is the apply/revert partner of the same change
    ///
    /// Partners share parent directory, order, description and environment;
    /// connector and extension may differ (a SQL apply can be reverted by a
    /// shell script).
    pub fn is_counterpart_of(&self, other: &Id) -> bool {
        self.parent_directory == other.parent_directory
            && self.order == other.order
            && self.description == other.description
            && self.environment == other.environment
            && self.change_type != other.change_type
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parent_directory
            .cmp(&other.parent_directory)
            .then(self.order_value.cmp(&other.order_value))
            .then_with(|| self.order.cmp(&other.order))
            .then_with(|| self.description.cmp(&other.description))
            .then_with(|| self.environment.cmp(&other.environment))
            .then_with(|| self.change_type.cmp(&other.change_type))
            .then_with(|| self.connector.cmp(&other.connector))
            .then_with(|| self.extension.cmp(&other.extension))
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_path())
    }
}
