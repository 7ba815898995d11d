//! Connector name to cached connector resolution

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use schemata_core::{CachedObjectFactory, CloseEvents, Configuration, Error, NamedConfigCache, Result};

use super::{Connector, ConnectorCloser, ConnectorFactory};
use crate::context::CommandContext;

/// Resolves connector names to long-lived connectors
///
/// A connector is identified by its name and the effective (already
/// evaluated) configuration under `connectors.<name>`. Per-environment
/// values therefore produce distinct connectors while repeated runs in one
/// environment share one.
pub struct ConnectorManager {
    factories: HashMap<String, Arc<dyn ConnectorFactory>>,
    cache: NamedConfigCache<Arc<dyn Connector>>,
    close_events: Arc<CloseEvents>,
}

impl ConnectorManager {
    /// Manager over `factories`; the first factory registered for a type wins
    pub fn new(factories: Vec<Arc<dyn ConnectorFactory>>, close_events: Arc<CloseEvents>) -> Self {
        let mut by_type: HashMap<String, Arc<dyn ConnectorFactory>> = HashMap::new();
        for factory in factories {
            let kind = factory.connector_type().to_string();
            if by_type.contains_key(&kind) {
                warn!(target: "schemata::connector", %kind, "Connector type already registered, ignoring later factory");
                continue;
            }
            by_type.insert(kind, factory);
        }
        ConnectorManager {
            factories: by_type,
            cache: NamedConfigCache::new(),
            close_events,
        }
    }

    /// Registered connector types, sorted
    pub fn connector_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Number of live cached connectors
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Cached connector for `name` under the context configuration
    pub fn get_connector_by_name(&self, name: &str, ctx: &CommandContext) -> Result<Arc<dyn Connector>> {
        let config = ctx
            .require_configuration()?
            .subset(&format!("connectors.{}", name));
        if config.get("type").map_or(true, |kind| kind.trim().is_empty()) {
            return Err(Error::configuration(format!(
                "connector '{}' is not configured (missing 'connectors.{}.type')",
                name, name
            )));
        }
        self.get_object(name, &config, ctx)
    }
}

impl CachedObjectFactory<CommandContext> for ConnectorManager {
    type Object = Arc<dyn Connector>;

    fn cache(&self) -> &NamedConfigCache<Self::Object> {
        &self.cache
    }

    fn create_new_object(
        &self,
        name: &str,
        config: &Configuration,
        ctx: &CommandContext,
    ) -> Result<Self::Object> {
        let kind = config.require("type")?.trim();
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| Error::UnknownConnectorType {
                connector: name.to_string(),
                kind: kind.to_string(),
            })?;
        let connector = factory.create_connector(name, config, ctx)?;
        self.close_events
            .subscribe(Arc::new(ConnectorCloser(Arc::clone(&connector))));
        info!(target: "schemata::connector", connector = name, %kind, "Connector created");
        Ok(connector)
    }
}

impl fmt::Debug for ConnectorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorManager")
            .field("types", &self.connector_types())
            .field("cached", &self.cache.len())
            .finish()
    }
}
