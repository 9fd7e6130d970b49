//! Request-path entity compaction.
//!
//! The [`EntityCompactor`] turns a live entity into the minimal attribute
//! tree worth persisting in an audit record: the difference against its
//! type's default state, with volatile keys removed.

use crate::cache::DefaultStateCache;
use lode_core::{AttributeTree, EntityTypeTag, RejectKeySet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the host while sampling or capturing entity state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Failed to spawn transient {entity_type} instance: {reason}")]
    SpawnFailed {
        entity_type: EntityTypeTag,
        reason: String,
    },

    #[error("Failed to capture entity state: {0}")]
    CaptureFailed(String),
}

/// Host environment collaborator.
///
/// The host owns entities; the compactor only asks it for type information,
/// transient default instances, and attribute snapshots.
pub trait EntityHost: Send + Sync {
    type Entity;

    /// The type tag of a live entity.
    fn entity_type(&self, entity: &Self::Entity) -> EntityTypeTag;

    /// Whether the host can create instances of `entity_type`.
    fn is_resolvable(&self, _entity_type: &EntityTypeTag) -> bool {
        true
    }

    /// Create a detached, non-persistent instance of `entity_type` at the
    /// location of `near`.
    fn spawn_transient(
        &self,
        entity_type: &EntityTypeTag,
        near: &Self::Entity,
    ) -> Result<Self::Entity, CaptureError>;

    /// Capture the current attribute tree of an entity.
    fn capture(&self, entity: &Self::Entity) -> Result<AttributeTree, CaptureError>;
}

/// Counters over all compactions performed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Entities compacted.
    pub compacted: u64,

    /// Entities skipped because their type is unknown or unresolvable.
    pub skipped: u64,

    /// Serialized bytes before compaction.
    pub bytes_before: u64,

    /// Serialized bytes after compaction.
    pub bytes_after: u64,
}

#[derive(Default)]
struct StatsCounter {
    compacted: AtomicU64,
    skipped: AtomicU64,
    bytes_before: AtomicU64,
    bytes_after: AtomicU64,
}

/// Compacts live entity snapshots against cached per-type baselines.
pub struct EntityCompactor<H: EntityHost> {
    host: H,
    cache: Arc<DefaultStateCache>,
    rejects: RejectKeySet,
    stats: StatsCounter,
}

impl<H: EntityHost> EntityCompactor<H> {
    /// Create a compactor with the default reject keys.
    pub fn new(host: H, cache: Arc<DefaultStateCache>) -> Self {
        Self::with_rejects(host, cache, RejectKeySet::default())
    }

    /// Create a compactor with a custom reject set.
    pub fn with_rejects(host: H, cache: Arc<DefaultStateCache>, rejects: RejectKeySet) -> Self {
        EntityCompactor {
            host,
            cache,
            rejects,
            stats: StatsCounter::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn cache(&self) -> &Arc<DefaultStateCache> {
        &self.cache
    }

    pub fn rejects(&self) -> &RejectKeySet {
        &self.rejects
    }

    pub fn stats(&self) -> CompactionStats {
        CompactionStats {
            compacted: self.stats.compacted.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            bytes_before: self.stats.bytes_before.load(Ordering::Relaxed),
            bytes_after: self.stats.bytes_after.load(Ordering::Relaxed),
        }
    }

    /// Baseline for the entity's type, sampling a transient instance on a miss.
    ///
    /// Returns `Ok(None)` for unknown or unresolvable types.
    pub fn baseline_for(
        &self,
        entity: &H::Entity,
    ) -> Result<Option<Arc<AttributeTree>>, CaptureError> {
        let entity_type = self.host.entity_type(entity);
        if entity_type.is_unknown() || !self.host.is_resolvable(&entity_type) {
            return Ok(None);
        }

        self.cache.get_or_populate(&entity_type, || {
            let transient = self.host.spawn_transient(&entity_type, entity)?;
            self.host.capture(&transient)
        })
    }

    /// Compact a live entity for persistence.
    ///
    /// Returns `Ok(None)` when the entity's type is unknown or unresolvable;
    /// no compaction is performed in that case. Capture faults abandon the
    /// call without touching the cache.
    pub fn process_entity(&self, entity: &H::Entity) -> Result<Option<AttributeTree>, CaptureError> {
        let Some(baseline) = self.baseline_for(entity)? else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let live = self.host.capture(entity)?;
        Ok(Some(self.compact(&self.host.entity_type(entity), &live, &baseline)))
    }

    /// Diff `live` against `baseline` and strip rejected keys.
    pub fn compact(
        &self,
        entity_type: &EntityTypeTag,
        live: &AttributeTree,
        baseline: &AttributeTree,
    ) -> AttributeTree {
        let original_len = live.serialized_len();
        let filtered = lode_core::compact(live, baseline, &self.rejects);
        let filtered_len = filtered.serialized_len();

        self.stats.compacted.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_before
            .fetch_add(original_len as u64, Ordering::Relaxed);
        self.stats
            .bytes_after
            .fetch_add(filtered_len as u64, Ordering::Relaxed);

        tracing::debug!(
            entity_type = %entity_type,
            original_bytes = original_len,
            filtered_bytes = filtered_len,
            "Filtered entity state"
        );

        filtered
    }
}
