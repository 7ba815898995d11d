//! Where raw configuration comes from

use std::path::{Path, PathBuf};

use tracing::debug;

use schemata_core::{Configuration, Result};

/// Produces the raw, unevaluated configuration of a run
pub trait ConfigurationSource: Send + Sync {
    /// Load the configuration
    fn load(&self) -> Result<Configuration>;
}

/// Configuration fixed at construction
#[derive(Debug, Clone, Default)]
pub struct StaticConfigurationSource {
    configuration: Configuration,
}

impl StaticConfigurationSource {
    /// Source always returning `configuration`
    pub fn new(configuration: Configuration) -> Self {
        StaticConfigurationSource { configuration }
    }
}

impl ConfigurationSource for StaticConfigurationSource {
    fn load(&self) -> Result<Configuration> {
        Ok(self.configuration.clone())
    }
}

/// TOML file read on every load
///
/// Nested tables are flattened into dotted keys:
///
/// ```toml
/// [connectors.main]
/// type = "jdbc"
/// url = "sqlite:${data}/app.db"
/// ```
#[derive(Debug, Clone)]
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    /// Source reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TomlFileSource { path: path.into() }
    }

    /// File this source reads
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigurationSource for TomlFileSource {
    fn load(&self) -> Result<Configuration> {
        let configuration = Configuration::from_file(&self.path)?;
        debug!(target: "schemata::pipeline", path = %self.path.display(), keys = configuration.len(), "Loaded configuration file");
        Ok(configuration)
    }
}
