//! Command pipeline for Schemata
//!
//! A command runs inside a [`CommandPipeline`]: an ordered chain of
//! interceptors that fill the per-run [`CommandContext`] before the command
//! sees it.
//!
//! ```text
//! ConfigurationInitializer  load + evaluate configuration
//!   -> SecretsInitializer   secrets manager
//!   -> ServiceInitializer   change file factory, state/change/lock services
//!   -> Command              apply, revert, validate, status, ...
//! ```
//!
//! ## Quick Start
//!
//! ```text
//! use schemata_executor::{ApplyCommand, CommandPipeline, TomlFileSource};
//!
//! let registry = Arc::new(ServiceRegistry::new(Arc::new(SqliteStore::open("state.db")?)));
//! let pipeline = CommandPipeline::standard(registry.clone(), Arc::new(TomlFileSource::new("schemata.toml")));
//!
//! let ctx = CommandContext::with_environment(Environment::new("DEV"));
//! let report = pipeline.execute(&ctx, &ApplyCommand)?;
//! println!("{report}");
//!
//! registry.close();
//! ```
//!
//! [`CommandContext`]: schemata_engine::CommandContext

#![warn(missing_docs)]
#![warn(clippy::all)]

mod command;
mod commands;
mod interceptors;
mod output;
mod pipeline;
mod source;

pub use command::Command;
pub use commands::{
    ApplyCommand, RevertCommand, StatusCommand, ValidateCommand, CHANGES_DIRECTORY_KEY,
    DEFAULT_CHANGES_DIRECTORY,
};
pub use interceptors::{ConfigurationInitializer, SecretsInitializer, ServiceInitializer};
pub use output::{ApplyReport, RevertReport, StatusReport};
pub use pipeline::{CommandInterceptor, CommandPipeline, Next};
pub use source::{ConfigurationSource, StaticConfigurationSource, TomlFileSource};
