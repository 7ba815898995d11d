//! Change engine for Schemata
//!
//! This crate turns parsed change files into executed work:
//! - `CommandContext`: typed, set-once state of one command run
//! - Script executor dispatch: extension to executor, SQL built in
//! - Connector dispatch: connector name to cached backend (jdbc, shell, ssh)
//! - `ChangeService`: environment check, then hand-off to the connector
//! - `StateService`: completion records, hashing and drift validation
//! - `ServiceRegistry`: process-wide owner of the long-lived services
//!
//! The registry is the only component that knows about:
//! - Which connector and script executor factories exist
//! - Resource lifetime (close events)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod connector;
pub mod context;
pub mod registry;
pub mod script;
pub mod state;
pub mod validation;

pub use change::ChangeService;
pub use connector::{Connector, ConnectorFactory, ConnectorManager};
pub use context::CommandContext;
pub use registry::{ServiceRegistry, ServiceRegistryBuilder};
pub use script::{ScriptExecutor, ScriptExecutorFactory, ScriptExecutorManager, SqlConnection};
pub use state::{file_hash, StateService, APPLIED_BY_KEY};
pub use validation::{ValidationFailure, ValidationReport};
