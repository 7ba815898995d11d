//! Per-invocation command context
//!
//! A `CommandContext` carries everything one command run needs. Interceptors
//! fill its slots on the way in; the command reads them. Every slot is
//! set-once: a second set fails with `ContextValueAlreadySet`, and reading
//! an empty slot through a `require_*` accessor fails with
//! `ContextValueMissing`.
//!
//! Plugins that need their own per-run values use the typed extension
//! registry, which follows the same set-once rule per type.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;

use schemata_concurrency::LockService;
use schemata_core::{
    Cancellation, ChangeFileFactory, Configuration, Environment, Error, Result, SecretsManager,
};

use crate::change::ChangeService;
use crate::state::StateService;

macro_rules! slot {
    ($field:ident, $set:ident, $require:ident, $ty:ty, $label:literal) => {
        #[doc = concat!("Set the ", $label, "; fails if already set")]
        pub fn $set(&self, value: $ty) -> Result<()> {
            self.$field
                .set(value)
                .map_err(|_| Error::ContextValueAlreadySet($label))
        }

        #[doc = concat!("The ", $label, ", if set")]
        pub fn $field(&self) -> Option<&$ty> {
            self.$field.get()
        }

        #[doc = concat!("The ", $label, "; fails if not set")]
        pub fn $require(&self) -> Result<&$ty> {
            self.$field.get().ok_or(Error::ContextValueMissing($label))
        }
    };
}

/// Typed, set-once state of one command run
#[derive(Default)]
pub struct CommandContext {
    configuration: OnceCell<Configuration>,
    environment: OnceCell<Environment>,
    secrets: OnceCell<Arc<dyn SecretsManager>>,
    change_file_factory: OnceCell<ChangeFileFactory>,
    state_service: OnceCell<Arc<StateService>>,
    change_service: OnceCell<Arc<ChangeService>>,
    lock_service: OnceCell<Arc<dyn LockService>>,
    extensions: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    cancellation: Cancellation,
}

impl CommandContext {
    /// Empty context with a fresh cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty context seeded with the environment to run against
    pub fn with_environment(environment: Environment) -> Self {
        let context = Self::new();
        let _ = context.environment.set(environment);
        context
    }

    /// Replace the cancellation token with one shared with the caller
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    slot!(configuration, set_configuration, require_configuration, Configuration, "configuration");
    slot!(environment, set_environment, require_environment, Environment, "environment");
    slot!(secrets, set_secrets, require_secrets, Arc<dyn SecretsManager>, "secrets manager");
    slot!(
        change_file_factory,
        set_change_file_factory,
        require_change_file_factory,
        ChangeFileFactory,
        "change file factory"
    );
    slot!(state_service, set_state_service, require_state_service, Arc<StateService>, "state service");
    slot!(change_service, set_change_service, require_change_service, Arc<ChangeService>, "change service");
    slot!(lock_service, set_lock_service, require_lock_service, Arc<dyn LockService>, "lock service");

    /// Cancellation token of this run
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Store a plugin value; one per type
    pub fn insert_extension<T: Any + Send + Sync>(&self, value: T) -> Result<()> {
        match self.extensions.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(Error::ContextValueAlreadySet(type_name::<T>())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(value));
                Ok(())
            }
        }
    }

    /// Plugin value of type `T`, if stored
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = self.extensions.get(&TypeId::of::<T>())?.value().clone();
        value.downcast::<T>().ok()
    }

    /// Plugin value of type `T`; fails if absent
    pub fn require_extension<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.extension::<T>()
            .ok_or(Error::ContextValueMissing(type_name::<T>()))
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("configuration", &self.configuration.get().map(Configuration::len))
            .field("environment", &self.environment.get().map(Environment::name))
            .field("secrets", &self.secrets.get().is_some())
            .field("change_file_factory", &self.change_file_factory.get())
            .field("state_service", &self.state_service.get().is_some())
            .field("change_service", &self.change_service.get().is_some())
            .field("lock_service", &self.lock_service.get().map(|l| l.lock_id().to_string()))
            .field("extensions", &self.extensions.len())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
