//! Named `VersionStore` backends, selected by `RewindConfig::store`.

use std::collections::BTreeMap;
use std::sync::Arc;

use rewind_storage::{MemoryStore, VersionStore};

use crate::error::RewindError;

type StoreFactory = Box<dyn Fn() -> Arc<dyn VersionStore> + Send + Sync>;

#[derive(Default)]
pub struct StoreRegistry {
    factories: BTreeMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `"memory"` backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", || Arc::new(MemoryStore::new()));
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn VersionStore> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the backend registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn VersionStore>, RewindError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.names().collect();
            RewindError::InvalidConfiguration(format!(
                "unknown store '{}' (registered: {})",
                name,
                known.join(", ")
            ))
        })?;
        Ok(factory())
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_memory() {
        let registry = StoreRegistry::with_defaults();
        assert!(registry.resolve("memory").is_ok());
    }

    #[test]
    fn unknown_name_lists_registered_backends() {
        let err = StoreRegistry::with_defaults()
            .resolve("postgres")
            .err()
            .unwrap();
        assert!(matches!(err, RewindError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("postgres"), "{err}");
        assert!(err.to_string().contains("memory"), "{err}");
    }

    #[test]
    fn each_resolve_builds_a_fresh_store() {
        let registry = StoreRegistry::with_defaults();
        let a = registry.resolve("memory").unwrap();
        let b = registry.resolve("memory").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
