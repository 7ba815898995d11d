//! Named-config caches
//!
//! Connectors and script executors are expensive to build (processes,
//! connections) and are identified by the pair (name, effective
//! configuration). [`NamedConfigCache`] memoizes one object per pair:
//!
//! - identical name + identical configuration → the same object
//! - a different configuration under the same name (e.g. a per-environment
//!   override) → a distinct object
//!
//! ## Thread Safety
//!
//! Construction uses DashMap's entry API, so a key is built at most once even
//! when many threads race for it. The shard stays locked while the object is
//! built: a constructor must not re-enter the same cache.

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::config::Configuration;
use crate::error::Result;

/// Cache key: a name plus a copy of the configuration it was built from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedConfigKey {
    name: String,
    config: BTreeMap<String, String>,
}

impl NamedConfigKey {
    /// Build a key, copying the configuration
    pub fn new(name: impl Into<String>, config: &Configuration) -> Self {
        NamedConfigKey {
            name: name.into(),
            config: config.as_map().clone(),
        }
    }

    /// Name part
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Memoizes one object per (name, configuration)
pub struct NamedConfigCache<T> {
    objects: DashMap<NamedConfigKey, T>,
}

impl<T: Clone> NamedConfigCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        NamedConfigCache {
            objects: DashMap::new(),
        }
    }

    /// Return the cached object for (name, config), building it on first use
    ///
    /// If `create` fails nothing is cached and the error is returned; a later
    /// call retries the construction.
    pub fn get_or_try_insert_with<F>(&self, name: &str, config: &Configuration, create: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let key = NamedConfigKey::new(name, config);
        if let Some(existing) = self.objects.get(&key) {
            return Ok(existing.value().clone());
        }
        let entry = self.objects.entry(key).or_try_insert_with(create)?;
        Ok(entry.value().clone())
    }

    /// Number of cached objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every cached object
    pub fn clear(&self) {
        self.objects.clear();
    }
}

impl<T: Clone> Default for NamedConfigCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for NamedConfigCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedConfigCache")
            .field("entries", &self.objects.len())
            .finish()
    }
}

/// A factory whose products are memoized per (name, configuration)
///
/// Implementors supply [`create_new_object`](Self::create_new_object) and the
/// cache; [`get_object`](Self::get_object) handles memoization. `C` is the
/// per-run context handed through to construction.
pub trait CachedObjectFactory<C: ?Sized> {
    /// Product type; cheap to clone (usually an `Arc`)
    type Object: Clone;

    /// Backing cache
    fn cache(&self) -> &NamedConfigCache<Self::Object>;

    /// Build a fresh object; called at most once per (name, config)
    fn create_new_object(&self, name: &str, config: &Configuration, context: &C) -> Result<Self::Object>;

    /// Cached object for (name, config)
    fn get_object(&self, name: &str, config: &Configuration, context: &C) -> Result<Self::Object> {
        self.cache()
            .get_or_try_insert_with(name, config, || self.create_new_object(name, config, context))
    }
}
