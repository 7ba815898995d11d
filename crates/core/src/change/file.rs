//! Executable change files

use std::fmt;
use std::path::{Path, PathBuf};

use super::{ChangeType, Id};
use crate::error::{Error, Result};

/// One executable unit of one direction
pub trait ChangeFile: fmt::Debug + Send + Sync {
    /// Parsed identity
    fn id(&self) -> &Id;

    /// Directory the file was discovered under
    fn changes_directory(&self) -> &Path;

    /// Full path of the file on disk
    fn file(&self) -> &Path;
}

macro_rules! change_file {
    ($(#[$meta:meta])* $name:ident, $change_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name {
            id: Id,
            changes_directory: PathBuf,
            file: PathBuf,
        }

        impl $name {
            /// Pair `id` with the directory it lives under
            ///
            /// # Errors
            ///
            /// Returns a grammar error if the id has a different change type.
            pub fn new(id: Id, changes_directory: impl Into<PathBuf>) -> Result<Self> {
                if id.change_type() != Some($change_type) {
                    return Err(Error::grammar(
                        id.to_string(),
                        format!("expected a '{}' change file", $change_type),
                    ));
                }
                let changes_directory = changes_directory.into();
                let file = changes_directory.join(id.relative_path());
                Ok(Self {
                    id,
                    changes_directory,
                    file,
                })
            }
        }

        impl ChangeFile for $name {
            fn id(&self) -> &Id {
                &self.id
            }

            fn changes_directory(&self) -> &Path {
                &self.changes_directory
            }

            fn file(&self) -> &Path {
                &self.file
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.id, f)
            }
        }
    };
}

change_file!(
    /// A change file that moves the target forward
    ApplyFile,
    ChangeType::Apply
);

change_file!(
    /// A change file that undoes an applied change
    RevertFile,
    ChangeType::Revert
);
