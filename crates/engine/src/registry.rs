//! Process-wide service registry
//!
//! Built once at process start and shared by `Arc`. It owns the long-lived
//! pieces (connector cache, script executor registry, close events) and
//! builds the per-run services the pipeline injects into each context.
//!
//! ```ignore
//! let registry = ServiceRegistry::builder(Arc::new(SqliteStore::open(path)?))
//!     .connector_factory(Arc::new(MyConnectorFactory))
//!     .build();
//! // ... run commands ...
//! registry.close();
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::info;

use schemata_concurrency::{DatabaseLockService, LockService, LOCK_ENABLED_KEY};
use schemata_core::{
    CloseEvents, Configuration, Environment, ExpressionEvaluator, PlaceholderEvaluator,
    RepositoryProvider, Result,
};

use crate::change::ChangeService;
use crate::connector::{
    ConnectorFactory, ConnectorManager, JdbcConnectorFactory, ShellConnectorFactory,
    SshCommandsConnectorFactory, SshScriptConnectorFactory,
};
use crate::script::{ScriptExecutorFactory, ScriptExecutorManager};
use crate::state::StateService;

/// Builder for [`ServiceRegistry`]
pub struct ServiceRegistryBuilder {
    repositories: Arc<dyn RepositoryProvider>,
    connector_factories: Vec<Arc<dyn ConnectorFactory>>,
    script_executor_factories: Vec<Arc<dyn ScriptExecutorFactory>>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ServiceRegistryBuilder {
    /// Register a plugin connector factory (built-in types take precedence)
    pub fn connector_factory(mut self, factory: Arc<dyn ConnectorFactory>) -> Self {
        self.connector_factories.push(factory);
        self
    }

    /// Register a plugin script executor factory (built-in extensions take precedence)
    pub fn script_executor_factory(mut self, factory: Arc<dyn ScriptExecutorFactory>) -> Self {
        self.script_executor_factories.push(factory);
        self
    }

    /// Replace the expression evaluator used for configuration values
    pub fn expression_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Build the registry
    pub fn build(self) -> ServiceRegistry {
        let close_events = Arc::new(CloseEvents::new());
        let script_executors = Arc::new(ScriptExecutorManager::with_plugins(
            self.script_executor_factories,
        ));
        let mut factories: Vec<Arc<dyn ConnectorFactory>> = vec![
            Arc::new(JdbcConnectorFactory::new(Arc::clone(&script_executors))),
            Arc::new(ShellConnectorFactory),
            Arc::new(SshCommandsConnectorFactory),
            Arc::new(SshScriptConnectorFactory),
        ];
        factories.extend(self.connector_factories);
        let connectors = Arc::new(ConnectorManager::new(factories, Arc::clone(&close_events)));
        ServiceRegistry {
            repositories: self.repositories,
            script_executors,
            connectors,
            evaluator: self.evaluator,
            close_events,
        }
    }
}

/// Long-lived services shared by every command run
pub struct ServiceRegistry {
    repositories: Arc<dyn RepositoryProvider>,
    script_executors: Arc<ScriptExecutorManager>,
    connectors: Arc<ConnectorManager>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    close_events: Arc<CloseEvents>,
}

impl ServiceRegistry {
    /// Start building a registry over `repositories`
    pub fn builder(repositories: Arc<dyn RepositoryProvider>) -> ServiceRegistryBuilder {
        ServiceRegistryBuilder {
            repositories,
            connector_factories: Vec::new(),
            script_executor_factories: Vec::new(),
            evaluator: Arc::new(PlaceholderEvaluator),
        }
    }

    /// Registry with only the built-in factories
    pub fn new(repositories: Arc<dyn RepositoryProvider>) -> Self {
        Self::builder(repositories).build()
    }

    /// State and lock stores
    pub fn repositories(&self) -> &Arc<dyn RepositoryProvider> {
        &self.repositories
    }

    /// Connector cache
    pub fn connectors(&self) -> &Arc<ConnectorManager> {
        &self.connectors
    }

    /// Script executor registry
    pub fn script_executors(&self) -> &Arc<ScriptExecutorManager> {
        &self.script_executors
    }

    /// Evaluator for configuration expressions
    pub fn expression_evaluator(&self) -> &Arc<dyn ExpressionEvaluator> {
        &self.evaluator
    }

    /// Close-event channel long-lived resources subscribe to
    pub fn close_events(&self) -> &Arc<CloseEvents> {
        &self.close_events
    }

    /// State service for `environment`
    pub fn state_service(&self, environment: &Environment, config: &Configuration) -> Result<StateService> {
        let repository = self.repositories.state_repository(environment)?;
        StateService::from_configuration(repository, config)
    }

    /// Change service for `environment`
    pub fn change_service(&self, environment: &Environment) -> ChangeService {
        ChangeService::new(Arc::clone(&self.connectors), environment.clone())
    }

    /// Lock service, or `None` when disabled or unsupported by the store
    pub fn lock_service(&self, config: &Configuration) -> Result<Option<Arc<dyn LockService>>> {
        if !config.get_bool(LOCK_ENABLED_KEY, true)? {
            info!(target: "schemata::registry", "Locking disabled by configuration");
            return Ok(None);
        }
        let Some(repository) = self.repositories.lock_repository()? else {
            info!(target: "schemata::registry", "Store has no lock support, running without lock");
            return Ok(None);
        };
        let service = DatabaseLockService::from_configuration(repository, config)?;
        Ok(Some(Arc::new(service)))
    }

    /// Publish the close event; returns how many resources closed cleanly
    pub fn close(&self) -> usize {
        let closed = self.close_events.publish();
        info!(target: "schemata::registry", closed, "Services closed");
        closed
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("connectors", &self.connectors)
            .field("script_executors", &self.script_executors)
            .field("close_events", &self.close_events)
            .finish()
    }
}
