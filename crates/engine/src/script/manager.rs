//! Extension to factory resolution

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use schemata_core::{Error, Result};

use super::{ScriptExecutorFactory, SqlScriptExecutorFactory};

/// How long a caller waits for another thread building the extension map
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves file extensions to script executor factories
///
/// The extension map is built on first lookup: the built-in SQL factory
/// first, then registered plugin factories in registration order. The first
/// factory claiming an extension keeps it; later claims are logged and
/// ignored. Extensions compare case-insensitively.
pub struct ScriptExecutorManager {
    plugins: Vec<Arc<dyn ScriptExecutorFactory>>,
    factories: OnceCell<HashMap<String, Arc<dyn ScriptExecutorFactory>>>,
    init_lock: Mutex<()>,
    init_timeout: Duration,
}

impl ScriptExecutorManager {
    /// Manager with only the built-in factories
    pub fn new() -> Self {
        Self::with_plugins(Vec::new())
    }

    /// Manager with plugin factories registered after the built-ins
    pub fn with_plugins(plugins: Vec<Arc<dyn ScriptExecutorFactory>>) -> Self {
        ScriptExecutorManager {
            plugins,
            factories: OnceCell::new(),
            init_lock: Mutex::new(()),
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    /// Override the wait for the one-time map construction
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Factory registered for `extension`
    pub fn get_script_executor_factory_by_extension(
        &self,
        extension: &str,
    ) -> Result<Arc<dyn ScriptExecutorFactory>> {
        let factories = self.factories()?;
        factories
            .get(&extension.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownScriptExtension {
                extension: extension.to_string(),
            })
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Result<Vec<String>> {
        let mut extensions: Vec<String> = self.factories()?.keys().cloned().collect();
        extensions.sort();
        Ok(extensions)
    }

    fn factories(&self) -> Result<&HashMap<String, Arc<dyn ScriptExecutorFactory>>> {
        if let Some(factories) = self.factories.get() {
            return Ok(factories);
        }
        let _guard = self.init_lock.try_lock_for(self.init_timeout).ok_or_else(|| {
            Error::Timeout(format!(
                "waited {:?} for the script executor registry",
                self.init_timeout
            ))
        })?;
        Ok(self.factories.get_or_init(|| self.build()))
    }

    fn build(&self) -> HashMap<String, Arc<dyn ScriptExecutorFactory>> {
        let builtin: Arc<dyn ScriptExecutorFactory> = Arc::new(SqlScriptExecutorFactory::new());
        let mut factories: HashMap<String, Arc<dyn ScriptExecutorFactory>> = HashMap::new();
        for factory in std::iter::once(&builtin).chain(self.plugins.iter()) {
            for extension in factory.extensions() {
                let extension = extension.to_ascii_lowercase();
                if factories.contains_key(&extension) {
                    warn!(target: "schemata::script", %extension, "Extension already registered, ignoring later factory");
                    continue;
                }
                factories.insert(extension, Arc::clone(factory));
            }
        }
        debug!(target: "schemata::script", extensions = factories.len(), "Script executor registry built");
        factories
    }
}

impl Default for ScriptExecutorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScriptExecutorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptExecutorManager")
            .field("plugins", &self.plugins.len())
            .field("initialized", &self.factories.get().is_some())
            .finish()
    }
}
