//! Named registry of caches for diagnostics.

use crate::cache::{CacheStats, DefaultStateCache};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A cache that can describe itself.
pub trait CacheReport: Send + Sync {
    fn entry_count(&self) -> usize;
    fn stats(&self) -> CacheStats;
}

impl CacheReport for DefaultStateCache {
    fn entry_count(&self) -> usize {
        self.len()
    }

    fn stats(&self) -> CacheStats {
        DefaultStateCache::stats(self)
    }
}

/// One line of a registry report.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
    pub stats: CacheStats,
}

/// Process-wide collection of named caches.
#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<BTreeMap<String, Arc<dyn CacheReport>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cache under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, cache: Arc<dyn CacheReport>) {
        self.caches.write().insert(name.into(), cache);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.caches.write().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CacheReport>> {
        self.caches.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    /// Summaries for every registered cache, ordered by name.
    pub fn report(&self) -> Vec<CacheSummary> {
        self.caches
            .read()
            .iter()
            .map(|(name, cache)| CacheSummary {
                name: name.clone(),
                entries: cache.entry_count(),
                stats: cache.stats(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use lode_core::{AttributeTree, EntityTypeTag};

    #[test]
    fn test_register_and_report() {
        let registry = CacheRegistry::new();
        let cache = Arc::new(DefaultStateCache::new(CacheConfig {
            record_stats: true,
            ..Default::default()
        }));
        registry.register("entityDefaults", cache.clone());

        cache.insert(EntityTypeTag::new("cow"), Arc::new(AttributeTree::new()));
        cache.get_if_present(&EntityTypeTag::new("cow"));

        let report = registry.report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].name, "entityDefaults");
        assert_eq!(report[0].entries, 1);
        assert_eq!(report[0].stats.hits, 1);
    }

    #[test]
    fn test_unregister() {
        let registry = CacheRegistry::new();
        registry.register("a", Arc::new(DefaultStateCache::new(CacheConfig::default())));

        assert_eq!(registry.names(), vec!["a".to_string()]);
        assert!(registry.get("a").is_some());
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.get("a").is_none());
    }
}
