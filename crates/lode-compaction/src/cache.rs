//! Bounded cache of per-type default state.
//!
//! The cache maps an [`EntityTypeTag`] to the attribute tree of a freshly
//! created instance of that type. Entries are evicted when the cache grows
//! past `max_size` (least recently used first) and when they have not been
//! read for `expires_after_access`. Every removal is logged and reported to
//! an optional listener; removals never block or fail.

use lode_core::{AttributeTree, DurationConfig, EntityTypeTag, TimeUnit};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for the default-state cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entity types. Zero disables caching.
    pub max_size: u64,

    /// Entries not read within this window are expired.
    pub expires_after_access: DurationConfig,

    /// Whether hit/miss/load/eviction counters are recorded.
    pub record_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_size: 100,
            expires_after_access: DurationConfig::new(10, TimeUnit::Minutes),
            record_stats: false,
        }
    }
}

/// Why an entry left the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalCause {
    /// Removed through `invalidate` or `invalidate_all`.
    Explicit,
    /// Overwritten by a newer value for the same type.
    Replaced,
    /// Not read within the idle window.
    Expired,
    /// Pushed out by the size bound.
    Size,
}

impl RemovalCause {
    /// Whether the cache removed the entry on its own.
    pub fn was_evicted(&self) -> bool {
        matches!(self, RemovalCause::Expired | RemovalCause::Size)
    }
}

/// Hook notified for every removal.
pub type RemovalListener = Arc<dyn Fn(&EntityTypeTag, &AttributeTree, RemovalCause) + Send + Sync>;

/// Time source for idle expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Snapshot of cache counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache; 1.0 when nothing was requested.
    pub fn hit_rate(&self) -> f64 {
        let requests = self.hits + self.misses;
        if requests == 0 {
            1.0
        } else {
            self.hits as f64 / requests as f64
        }
    }
}

#[derive(Default)]
struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

impl StatsCounter {
    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

struct CacheEntry {
    value: Arc<AttributeTree>,
    last_access: Instant,
}

/// Bounded, idle-expiring cache of baseline attribute trees.
///
/// Cached trees are shared as `Arc<AttributeTree>` and never handed out
/// mutably, so a baseline cannot change once it is stored.
pub struct DefaultStateCache {
    config: CacheConfig,
    ttl: Duration,
    entries: Mutex<LruCache<EntityTypeTag, CacheEntry>>,
    populating: Mutex<HashMap<EntityTypeTag, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
    listener: Option<RemovalListener>,
    stats: StatsCounter,
}

impl DefaultStateCache {
    /// Create a cache using the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with a custom time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        // An unbounded map is never used: a zero size stores nothing
        let capacity = usize::try_from(config.max_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .unwrap_or(NonZeroUsize::MIN);

        DefaultStateCache {
            ttl: config.expires_after_access.to_duration(),
            config,
            entries: Mutex::new(LruCache::new(capacity)),
            populating: Mutex::new(HashMap::new()),
            clock,
            listener: None,
            stats: StatsCounter::default(),
        }
    }

    /// Attach a removal listener.
    pub fn with_removal_listener(mut self, listener: RemovalListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot. All zeros unless `record_stats` is enabled.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Return the cached baseline for `entity_type`, if present and fresh.
    pub fn get_if_present(&self, entity_type: &EntityTypeTag) -> Option<Arc<AttributeTree>> {
        if entity_type.is_unknown() {
            return None;
        }
        let found = self.lookup(entity_type);
        if found.is_some() {
            self.record(&self.stats.hits);
        } else {
            self.record(&self.stats.misses);
        }
        found
    }

    /// Return the baseline for `entity_type`, populating it on a miss.
    ///
    /// `populate` runs at most once per concurrent miss on the same type:
    /// other callers missing on that type wait and then read the stored
    /// entry. A failed population stores nothing and the error is returned
    /// to the caller. The unknown type is never cached and yields `Ok(None)`.
    pub fn get_or_populate<F, E>(
        &self,
        entity_type: &EntityTypeTag,
        populate: F,
    ) -> Result<Option<Arc<AttributeTree>>, E>
    where
        F: FnOnce() -> Result<AttributeTree, E>,
    {
        if entity_type.is_unknown() {
            return Ok(None);
        }

        if let Some(hit) = self.lookup(entity_type) {
            self.record(&self.stats.hits);
            return Ok(Some(hit));
        }

        let gate = self.population_gate(entity_type);
        let _guard = gate.lock();

        // Another caller may have populated while we waited on the gate
        if let Some(hit) = self.lookup(entity_type) {
            self.release_gate(entity_type, &gate);
            self.record(&self.stats.hits);
            return Ok(Some(hit));
        }

        self.record(&self.stats.misses);

        let captured = match populate() {
            Ok(tree) => tree,
            Err(err) => {
                self.release_gate(entity_type, &gate);
                self.record(&self.stats.load_failures);
                return Err(err);
            }
        };

        tracing::debug!(
            entity_type = %entity_type,
            bytes = captured.serialized_len(),
            "Caching default entity state"
        );

        let baseline = Arc::new(captured);
        self.insert(entity_type.clone(), Arc::clone(&baseline));
        self.release_gate(entity_type, &gate);
        self.record(&self.stats.loads);

        Ok(Some(baseline))
    }

    /// Store a baseline directly, replacing any existing entry.
    pub fn insert(&self, entity_type: EntityTypeTag, baseline: Arc<AttributeTree>) {
        if entity_type.is_unknown() {
            return;
        }

        let now = self.clock.now();
        let removed = if self.config.max_size == 0 {
            Some((entity_type, baseline, RemovalCause::Size))
        } else {
            let entry = CacheEntry {
                value: baseline,
                last_access: now,
            };
            match self.entries.lock().push(entity_type.clone(), entry) {
                Some((old_type, old)) if old_type == entity_type => {
                    Some((old_type, old.value, RemovalCause::Replaced))
                }
                Some((old_type, old)) => Some((old_type, old.value, RemovalCause::Size)),
                None => None,
            }
        };

        if let Some((old_type, old_value, cause)) = removed {
            self.notify(&old_type, &old_value, cause);
        }
    }

    /// Remove one entry.
    pub fn invalidate(&self, entity_type: &EntityTypeTag) {
        let removed = self.entries.lock().pop(entity_type);
        if let Some(entry) = removed {
            self.notify(entity_type, &entry.value, RemovalCause::Explicit);
        }
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        let drained: Vec<_> = {
            let mut entries = self.entries.lock();
            std::iter::from_fn(|| entries.pop_lru()).collect()
        };
        for (entity_type, entry) in drained {
            self.notify(&entity_type, &entry.value, RemovalCause::Explicit);
        }
    }

    /// Sweep entries that have passed the idle window.
    ///
    /// Returns the number of entries expired.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<_> = {
            let mut entries = self.entries.lock();
            let stale: Vec<EntityTypeTag> = entries
                .iter()
                .filter(|(_, entry)| self.is_expired(entry, now))
                .map(|(entity_type, _)| entity_type.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|entity_type| entries.pop_entry(&entity_type))
                .collect()
        };

        let count = expired.len();
        for (entity_type, entry) in expired {
            self.notify(&entity_type, &entry.value, RemovalCause::Expired);
        }
        count
    }

    /// Fresh entry lookup; touches recency and expires stale entries.
    fn lookup(&self, entity_type: &EntityTypeTag) -> Option<Arc<AttributeTree>> {
        let now = self.clock.now();
        let expired = {
            let mut entries = self.entries.lock();
            let fresh = entries.get_mut(entity_type).map(|entry| {
                if self.is_expired(entry, now) {
                    None
                } else {
                    entry.last_access = now;
                    Some(Arc::clone(&entry.value))
                }
            });

            match fresh {
                Some(Some(value)) => return Some(value),
                Some(None) => entries.pop(entity_type),
                None => None,
            }
        };

        if let Some(entry) = expired {
            self.notify(entity_type, &entry.value, RemovalCause::Expired);
        }
        None
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_access) >= self.ttl
    }

    fn population_gate(&self, entity_type: &EntityTypeTag) -> Arc<Mutex<()>> {
        Arc::clone(self.populating.lock().entry(entity_type.clone()).or_default())
    }

    fn release_gate(&self, entity_type: &EntityTypeTag, gate: &Arc<Mutex<()>>) {
        let mut populating = self.populating.lock();
        if populating
            .get(entity_type)
            .is_some_and(|current| Arc::ptr_eq(current, gate))
        {
            populating.remove(entity_type);
        }
    }

    fn notify(&self, entity_type: &EntityTypeTag, value: &AttributeTree, cause: RemovalCause) {
        if cause.was_evicted() {
            self.record(&self.stats.evictions);
            tracing::debug!(
                entity_type = %entity_type,
                cause = ?cause,
                bytes = value.serialized_len(),
                "Evicting entity default from cache"
            );
        } else {
            tracing::debug!(
                entity_type = %entity_type,
                cause = ?cause,
                bytes = value.serialized_len(),
                "Removing entity default from cache"
            );
        }

        if let Some(listener) = &self.listener {
            listener(entity_type, value, cause);
        }
    }

    fn record(&self, counter: &AtomicU64) {
        if self.config.record_stats {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}
