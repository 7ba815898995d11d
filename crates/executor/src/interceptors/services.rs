//! Engine service injection

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use schemata_concurrency::LockService;
use schemata_core::{ChangeFileFactory, Error, Result};
use schemata_engine::{CommandContext, ServiceRegistry};

use crate::pipeline::{CommandInterceptor, Next};

/// Builds the engine services a command works with
///
/// Each value is injected only when the context does not hold one yet, so
/// callers may seed their own. State and change services need an
/// environment and are skipped without one. The lock service is built once
/// per initializer, from the first configuration it sees, and shared by
/// every later run.
pub struct ServiceInitializer {
    registry: Arc<ServiceRegistry>,
    lock_service: OnceCell<Option<Arc<dyn LockService>>>,
}

impl ServiceInitializer {
    /// Initializer building services from `registry`
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        ServiceInitializer {
            registry,
            lock_service: OnceCell::new(),
        }
    }

    fn lock_service(&self, ctx: &CommandContext) -> Result<Option<Arc<dyn LockService>>> {
        let config = ctx.require_configuration()?;
        let service = self.lock_service.get_or_try_init(|| {
            let service = self.registry.lock_service(config)?;
            if let Some(service) = &service {
                info!(target: "schemata::pipeline", lock_id = service.lock_id(), "Lock service ready");
            }
            Ok::<_, Error>(service)
        })?;
        Ok(service.clone())
    }
}

impl CommandInterceptor for ServiceInitializer {
    fn name(&self) -> &str {
        "services"
    }

    fn intercept(&self, ctx: &CommandContext, next: Next<'_>) -> Result<()> {
        let config = ctx.require_configuration()?;

        if ctx.change_file_factory().is_none() {
            ctx.set_change_file_factory(ChangeFileFactory::from_configuration(config)?)?;
        }

        if let Some(environment) = ctx.environment() {
            if ctx.state_service().is_none() {
                let service = self.registry.state_service(environment, config)?;
                ctx.set_state_service(Arc::new(service))?;
            }
            if ctx.change_service().is_none() {
                ctx.set_change_service(Arc::new(self.registry.change_service(environment)))?;
            }
        } else {
            debug!(target: "schemata::pipeline", "No environment, skipping state and change services");
        }

        if ctx.lock_service().is_none() {
            if let Some(service) = self.lock_service(ctx)? {
                ctx.set_lock_service(service)?;
            }
        }

        next.run(ctx)
    }
}

impl fmt::Debug for ServiceInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInitializer")
            .field("lock_built", &self.lock_service.get().is_some())
            .finish()
    }
}
