//! Interceptor chain around a command
//!
//! A [`CommandPipeline`] holds an ordered list of interceptors. Executing a
//! command walks the list front to back; each interceptor receives the
//! context and a [`Next`] handle that runs the rest of the chain, ending in
//! the command itself.
//!
//! ```text
//! ConfigurationInitializer -> SecretsInitializer -> ServiceInitializer -> command
//! ```
//!
//! An interceptor short-circuits by returning an error. Returning `Ok`
//! without calling [`Next::run`] leaves the command unexecuted, which the
//! pipeline reports as an internal error.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use schemata_core::{Error, Result};
use schemata_engine::{CommandContext, ServiceRegistry};

use crate::command::Command;
use crate::interceptors::{ConfigurationInitializer, SecretsInitializer, ServiceInitializer};
use crate::source::ConfigurationSource;

/// Middleware run before a command
pub trait CommandInterceptor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Prepare `ctx`, then continue with `next`
    fn intercept(&self, ctx: &CommandContext, next: Next<'_>) -> Result<()>;
}

/// Remainder of the chain after the current interceptor
pub struct Next<'a> {
    remaining: &'a [Arc<dyn CommandInterceptor>],
    terminal: &'a mut (dyn FnMut(&CommandContext) -> Result<()> + 'a),
}

impl<'a> Next<'a> {
    /// Run the remaining interceptors and then the command
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        match self.remaining.split_first() {
            Some((interceptor, rest)) => {
                debug!(target: "schemata::pipeline", interceptor = interceptor.name(), "Entering interceptor");
                interceptor.intercept(
                    ctx,
                    Next {
                        remaining: rest,
                        terminal: self.terminal,
                    },
                )
            }
            None => (self.terminal)(ctx),
        }
    }
}

/// Ordered interceptors plus the entry point that runs commands through them
#[derive(Clone, Default)]
pub struct CommandPipeline {
    interceptors: Vec<Arc<dyn CommandInterceptor>>,
}

impl CommandPipeline {
    /// Pipeline with the given interceptors, run in order
    pub fn new(interceptors: Vec<Arc<dyn CommandInterceptor>>) -> Self {
        CommandPipeline { interceptors }
    }

    /// The standard chain: configuration, secrets, services
    pub fn standard(registry: Arc<ServiceRegistry>, source: Arc<dyn ConfigurationSource>) -> Self {
        let evaluator = Arc::clone(registry.expression_evaluator());
        Self::new(vec![
            Arc::new(ConfigurationInitializer::new(source, evaluator)),
            Arc::new(SecretsInitializer::new()),
            Arc::new(ServiceInitializer::new(registry)),
        ])
    }

    /// Append an interceptor after the existing ones
    pub fn with_interceptor(mut self, interceptor: Arc<dyn CommandInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Interceptors in execution order
    pub fn interceptors(&self) -> &[Arc<dyn CommandInterceptor>] {
        &self.interceptors
    }

    /// Run `command` through every interceptor
    pub fn execute<C>(&self, ctx: &CommandContext, command: &C) -> Result<C::Output>
    where
        C: Command + ?Sized,
    {
        let mut output = None;
        let mut terminal = |ctx: &CommandContext| -> Result<()> {
            output = Some(command.execute(ctx)?);
            Ok(())
        };
        Next {
            remaining: &self.interceptors,
            terminal: &mut terminal,
        }
        .run(ctx)?;
        output.ok_or_else(|| {
            Error::Internal("an interceptor completed without running the command".into())
        })
    }
}

impl fmt::Debug for CommandPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.interceptors.iter().map(|i| i.name()))
            .finish()
    }
}
