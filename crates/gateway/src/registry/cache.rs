//! Lock-free holder for the current [`Registry`].
//!
//! The registry is read on every request and replaced wholesale by the
//! background reload task, so it lives behind `arc-swap`.

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::model::Registry;

/// Shared, lock-free handle to the current registry.
#[derive(Clone, Debug)]
pub struct RegistryCache {
    inner: Arc<ArcSwap<Registry>>,
}

impl RegistryCache {
    /// Create a cache holding an empty registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::default())
    }

    /// Create a cache seeded with `registry`.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    /// Snapshot of the current registry. Cheap; safe on the hot path.
    pub fn load(&self) -> Arc<Registry> {
        self.inner.load_full()
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Atomically replace the registry. In-flight requests keep the snapshot
    /// they already loaded.
    pub fn replace(&self, registry: Registry) {
        self.inner.store(Arc::new(registry));
    }
}

impl Default for RegistryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(yaml: &str) -> Registry {
        Registry::from_yaml(yaml).unwrap()
    }

    #[test]
    fn initially_empty() {
        let cache = RegistryCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn replace_is_atomic() {
        let cache = RegistryCache::with_registry(registry(
            "tables:\n  a:\n    columns: { id: uuid }\n",
        ));
        let before = cache.load();

        cache.replace(registry("tables:\n  b:\n    columns: { id: uuid }\n"));

        assert!(cache.load().table("a").is_none());
        assert!(cache.load().table("b").is_some());
        // A snapshot taken earlier is unaffected.
        assert!(before.table("a").is_some());
    }
}
