//! Configuration loading and evaluation for the run's environment

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use schemata_core::{Environment, ExpressionEvaluator, Result};
use schemata_engine::CommandContext;

use crate::pipeline::{CommandInterceptor, Next};
use crate::source::ConfigurationSource;

/// Loads configuration and evaluates it for the run's environment
///
/// With an environment in the context, every value is evaluated as an
/// expression. Variables come from `environments.<name>.*` in the raw
/// configuration, overridden by values seeded on the context's environment.
/// Without an environment the raw configuration is injected unchanged.
pub struct ConfigurationInitializer {
    source: Arc<dyn ConfigurationSource>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ConfigurationInitializer {
    /// Initializer reading `source` and evaluating with `evaluator`
    pub fn new(source: Arc<dyn ConfigurationSource>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        ConfigurationInitializer { source, evaluator }
    }
}

impl CommandInterceptor for ConfigurationInitializer {
    fn name(&self) -> &str {
        "configuration"
    }

    fn intercept(&self, ctx: &CommandContext, next: Next<'_>) -> Result<()> {
        let raw = self.source.load()?;
        let configuration = match ctx.environment() {
            Some(environment) => {
                let mut values =
                    Environment::from_configuration(environment.name(), &raw).expression_values();
                values.extend(
                    environment
                        .values()
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone())),
                );
                debug!(target: "schemata::pipeline", environment = environment.name(), variables = values.len(), "Evaluating configuration");
                raw.evaluate(self.evaluator.as_ref(), &values)?
            }
            None => raw,
        };
        ctx.set_configuration(configuration)?;
        next.run(ctx)
    }
}

impl fmt::Debug for ConfigurationInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationInitializer").finish_non_exhaustive()
    }
}
