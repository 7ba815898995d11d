//! Change file name parsing and discovery
//!
//! ## Grammar
//!
//! The file name (last path component) is split on literal `.` and must
//! yield exactly 5 segments (no environment) or 6 (with environment):
//!
//! ```text
//! 001.create_users.DEV.apply.jdbc.sql    -> environment = DEV
//! 002.add_index.apply.jdbc.sql           -> environment = none
//! ```
//!
//! The parent directory is normalized to `/` separators so ids are identical
//! across platforms.

use std::path::{Component, Path};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{ApplyFile, ChangeFile, ChangeType, Id, RevertFile};
use crate::config::Configuration;
use crate::error::{Error, Result};

/// Default maximum length of a change file path, in characters
pub const DEFAULT_MAX_PATH_LENGTH: usize = 256;

/// Configuration key overriding [`DEFAULT_MAX_PATH_LENGTH`]
pub const MAX_PATH_LENGTH_KEY: &str = "changes.max-path-length";

const SEGMENTS_WITHOUT_ENVIRONMENT: usize = 5;
const SEGMENTS_WITH_ENVIRONMENT: usize = 6;

/// Parses change file paths into [`Id`]s
///
/// Stateless after construction; safe to share across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFileFactory {
    max_path_length: usize,
}

/// Result of scanning a changes directory
#[derive(Debug, Clone, Default)]
pub struct ChangeFiles {
    /// Apply files, sorted by id
    pub apply_files: Vec<ApplyFile>,
    /// Revert files, sorted by id
    pub revert_files: Vec<RevertFile>,
}

impl ChangeFiles {
    /// Find the revert file paired with an applied id
    pub fn revert_for(&self, applied: &Id) -> Option<&RevertFile> {
        self.revert_files
            .iter()
            .find(|revert| revert.id().is_counterpart_of(applied))
    }

    /// Find the apply file whose stringified id is `id`
    pub fn apply_by_id(&self, id: &str) -> Option<&ApplyFile> {
        self.apply_files
            .iter()
            .find(|apply| apply.id().relative_path() == id)
    }
}

impl ChangeFileFactory {
    /// Create a factory with the default maximum path length
    pub fn new() -> Self {
        Self::with_max_path_length(DEFAULT_MAX_PATH_LENGTH)
    }

    /// Create a factory with a custom maximum path length
    pub fn with_max_path_length(max_path_length: usize) -> Self {
        ChangeFileFactory { max_path_length }
    }

    /// Create a factory honouring `changes.max-path-length`
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        let max = config.get_u64(MAX_PATH_LENGTH_KEY, DEFAULT_MAX_PATH_LENGTH as u64)?;
        let max = usize::try_from(max).map_err(|_| {
            Error::configuration(format!("{} is out of range: {}", MAX_PATH_LENGTH_KEY, max))
        })?;
        Ok(Self::with_max_path_length(max))
    }

    /// Maximum accepted path length
    pub fn max_path_length(&self) -> usize {
        self.max_path_length
    }

    /// Parse a path relative to the changes directory
    ///
    /// # Errors
    ///
    /// - [`Error::PathTooLong`] if the normalized path exceeds the maximum
    /// - [`Error::Grammar`] for absolute paths, a wrong segment count, a
    ///   non-numeric or negative order, an unknown change type, or any blank
    ///   required segment
    pub fn parse(&self, relative_path: impl AsRef<Path>) -> Result<Id> {
        let path = relative_path.as_ref();
        let display = path.to_string_lossy().into_owned();

        if path.is_absolute() || path.has_root() {
            return Err(Error::grammar(display, "change file path must be relative"));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::grammar(display.clone(), "path has no file name"))?;

        let parent_directory = path
            .parent()
            .map(normalize_directory)
            .unwrap_or_default();

        let normalized = if parent_directory.is_empty() {
            file_name.clone()
        } else {
            format!("{}/{}", parent_directory, file_name)
        };
        let length = normalized.chars().count();
        if length > self.max_path_length {
            return Err(Error::PathTooLong {
                path: normalized,
                length,
                max: self.max_path_length,
            });
        }

        let segments: Vec<&str> = file_name.split('.').collect();
        if segments.len() != SEGMENTS_WITHOUT_ENVIRONMENT
            && segments.len() != SEGMENTS_WITH_ENVIRONMENT
        {
            return Err(Error::grammar(
                normalized,
                format!(
                    "expected {} or {} '.'-separated segments, found {}",
                    SEGMENTS_WITHOUT_ENVIRONMENT,
                    SEGMENTS_WITH_ENVIRONMENT,
                    segments.len()
                ),
            ));
        }

        let has_environment = segments.len() == SEGMENTS_WITH_ENVIRONMENT;
        let mut parts = segments.into_iter();
        let mut next = || parts.next().unwrap_or_default();

        let order = next();
        let order_value = parse_order(&normalized, order)?;
        let description = required(&normalized, "description", next())?;
        let environment = if has_environment {
            Some(required(&normalized, "environment", next())?)
        } else {
            None
        };
        let change_type = parse_change_type(&normalized, next())?;
        let connector = required(&normalized, "connector", next())?;
        let extension = required(&normalized, "extension", next())?;

        Ok(Id::from_parts(
            parent_directory,
            order.to_string(),
            order_value,
            description,
            environment,
            change_type,
            connector,
            extension,
        ))
    }

    /// Parse `relative_path` and pair it with `changes_directory` as an apply file
    pub fn create_apply_file(
        &self,
        changes_directory: &Path,
        relative_path: impl AsRef<Path>,
    ) -> Result<ApplyFile> {
        ApplyFile::new(self.parse(relative_path)?, changes_directory)
    }

    /// Parse `relative_path` and pair it with `changes_directory` as a revert file
    pub fn create_revert_file(
        &self,
        changes_directory: &Path,
        relative_path: impl AsRef<Path>,
    ) -> Result<RevertFile> {
        RevertFile::new(self.parse(relative_path)?, changes_directory)
    }

    /// Recursively discover every change file under `changes_directory`
    ///
    /// Hidden entries (names starting with `.`) are ignored. Files whose type
    /// is the literal `null` are skipped with a warning. Any other grammar
    /// violation aborts the scan.
    pub fn scan(&self, changes_directory: &Path) -> Result<ChangeFiles> {
        let root = changes_directory.canonicalize().map_err(|e| {
            Error::configuration(format!(
                "changes directory '{}' is not accessible: {}",
                changes_directory.display(),
                e
            ))
        })?;

        let mut files = ChangeFiles::default();
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| Error::Internal(format!("walked outside changes directory: {}", e)))?;
            let id = self.parse(relative)?;
            match id.change_type() {
                Some(ChangeType::Apply) => files.apply_files.push(ApplyFile::new(id, &root)?),
                Some(ChangeType::Revert) => files.revert_files.push(RevertFile::new(id, &root)?),
                None => warn!(target: "schemata::changes", file = %id, "Skipping change file with null type"),
            }
        }

        files.apply_files.sort();
        files.revert_files.sort();
        debug!(
            target: "schemata::changes",
            directory = %root.display(),
            apply = files.apply_files.len(),
            revert = files.revert_files.len(),
            "Scanned changes directory"
        );
        Ok(files)
    }
}

impl Default for ChangeFileFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_directory(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn parse_order(path: &str, order: &str) -> Result<u64> {
    if order.trim().is_empty() {
        return Err(Error::grammar(path, "order is blank"));
    }
    if order.starts_with('-') {
        return Err(Error::grammar(path, format!("order '{}' must not be negative", order)));
    }
    if !order.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::grammar(path, format!("order '{}' is not a number", order)));
    }
    order
        .parse::<u64>()
        .map_err(|_| Error::grammar(path, format!("order '{}' is too large", order)))
}

fn parse_change_type(path: &str, segment: &str) -> Result<Option<ChangeType>> {
    if segment == "null" {
        return Ok(None);
    }
    if segment.trim().is_empty() {
        return Err(Error::grammar(path, "change type is blank"));
    }
    segment
        .parse::<ChangeType>()
        .map(Some)
        .map_err(|reason| Error::grammar(path, reason))
}

fn required(path: &str, field: &str, segment: &str) -> Result<String> {
    if segment.trim().is_empty() {
        return Err(Error::grammar(path, format!("{} is blank", field)));
    }
    Ok(segment.to_string())
}
