//! # lode-compaction
//!
//! Baseline-diff compaction of entity snapshots for the Lodestone audit store.
//!
//! This crate provides:
//! - Default-state cache: bounded, idle-expiring map from entity type to the
//!   attribute tree of a freshly created instance of that type
//! - Entity compaction: diff a live snapshot against its type's baseline and
//!   strip volatile keys before the snapshot is persisted
//! - Cache registry: named diagnostics over every cache in the process
//!
//! ## Architecture
//!
//! Compaction keeps audit records small by:
//! 1. Resolving the entity's type (unknown types are skipped entirely)
//! 2. Looking up the type's baseline, sampling a transient instance on a miss
//! 3. Capturing the live entity's attribute tree
//! 4. Keeping only what differs from the baseline, minus rejected keys
//!
//! ## Example
//!
//! ```rust,ignore
//! use lode_compaction::{CacheConfig, DefaultStateCache, EntityCompactor};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(DefaultStateCache::new(CacheConfig::default()));
//! let compactor = EntityCompactor::new(host, cache);
//!
//! if let Some(delta) = compactor.process_entity(&entity)? {
//!     persist(delta);
//! }
//! ```

mod cache;
mod compactor;
mod registry;

pub use cache::{
    CacheConfig, CacheStats, Clock, DefaultStateCache, RemovalCause, RemovalListener, SystemClock,
};
pub use compactor::{CaptureError, CompactionStats, EntityCompactor, EntityHost};
pub use registry::{CacheRegistry, CacheReport, CacheSummary};
