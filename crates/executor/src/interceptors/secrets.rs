//! Secrets manager injection

use std::fmt;
use std::sync::Arc;

use schemata_core::{PlainSecretsManager, Result, SecretsManager};
use schemata_engine::CommandContext;

use crate::pipeline::{CommandInterceptor, Next};

/// Injects the secrets manager unless the caller already did
#[derive(Clone)]
pub struct SecretsInitializer {
    secrets: Arc<dyn SecretsManager>,
}

impl SecretsInitializer {
    /// Initializer providing the pass-through manager
    pub fn new() -> Self {
        Self::with_secrets(Arc::new(PlainSecretsManager))
    }

    /// Initializer providing `secrets`
    pub fn with_secrets(secrets: Arc<dyn SecretsManager>) -> Self {
        SecretsInitializer { secrets }
    }
}

impl Default for SecretsInitializer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandInterceptor for SecretsInitializer {
    fn name(&self) -> &str {
        "secrets"
    }

    fn intercept(&self, ctx: &CommandContext, next: Next<'_>) -> Result<()> {
        if ctx.secrets().is_none() {
            ctx.set_secrets(Arc::clone(&self.secrets))?;
        }
        next.run(ctx)
    }
}

impl fmt::Debug for SecretsInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsInitializer").finish_non_exhaustive()
    }
}
