//! Change file identity
//!
//! A change file encodes its migration intent in its name:
//!
//! ```text
//! <order>.<description>[.<environment>].<type>.<connector>.<extension>
//! ```
//!
//! - `order`: non-negative integer, leading zeros preserved
//! - `environment`: optional; absent means the file applies everywhere
//! - `type`: `apply` or `revert` (case-insensitive), or the literal `null`
//! - `connector`: name of a configured connector
//! - `extension`: selects the script executor
//!
//! [`ChangeFileFactory`] parses relative paths into [`Id`]s and scans a
//! changes directory into [`ApplyFile`]s and [`RevertFile`]s.

mod factory;
mod file;
mod id;

pub use factory::{ChangeFileFactory, ChangeFiles, DEFAULT_MAX_PATH_LENGTH, MAX_PATH_LENGTH_KEY};
pub use file::{ApplyFile, ChangeFile, RevertFile};
pub use id::{ChangeType, Id};
