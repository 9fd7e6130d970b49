//! Integration tests for entity compaction.
//!
//! These tests verify:
//! - Baselines are sampled once per type, even under concurrent misses
//! - Capture faults never write a cache entry
//! - Evicted baselines are re-sampled on the next request
//! - Compacted output never carries rejected or default state

use lode_compaction::{
    CacheConfig, CaptureError, DefaultStateCache, EntityCompactor, EntityHost, RemovalCause,
    RemovalListener,
};
use lode_core::{AttributeTree, EntityTypeTag, RejectKeySet, Tag};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Simulated world: entities are typed attribute trees, transient instances
/// come from a table of per-type defaults.
mod world {
    use super::*;

    #[derive(Clone, Debug)]
    pub struct Mob {
        pub kind: EntityTypeTag,
        pub state: AttributeTree,
    }

    impl Mob {
        pub fn new(kind: &str, state: AttributeTree) -> Self {
            Mob {
                kind: EntityTypeTag::new(kind),
                state,
            }
        }
    }

    pub struct World {
        pub defaults: HashMap<String, AttributeTree>,
        pub spawns: AtomicUsize,
        pub spawn_delay: Duration,
        pub broken_types: Mutex<Vec<String>>,
    }

    impl World {
        pub fn new() -> Self {
            let mut defaults = HashMap::new();
            defaults.insert(
                "cow".to_string(),
                AttributeTree::new()
                    .with("Age", Tag::Int(0))
                    .with("Health", Tag::Float(10.0))
                    .with("Motion", Tag::List(vec![Tag::Double(0.0); 3]))
                    .with("Brain", AttributeTree::new().with("memories", AttributeTree::new())),
            );
            defaults.insert(
                "zombie".to_string(),
                AttributeTree::new()
                    .with("CanBreakDoors", Tag::Byte(0))
                    .with("Health", Tag::Float(20.0))
                    .with("IsBaby", Tag::Byte(0)),
            );

            World {
                defaults,
                spawns: AtomicUsize::new(0),
                spawn_delay: Duration::ZERO,
                broken_types: Mutex::new(Vec::new()),
            }
        }

        pub fn with_spawn_delay(mut self, delay: Duration) -> Self {
            self.spawn_delay = delay;
            self
        }

        pub fn spawns(&self) -> usize {
            self.spawns.load(Ordering::SeqCst)
        }
    }

    impl EntityHost for World {
        type Entity = Mob;

        fn entity_type(&self, entity: &Mob) -> EntityTypeTag {
            entity.kind.clone()
        }

        fn is_resolvable(&self, entity_type: &EntityTypeTag) -> bool {
            self.defaults.contains_key(entity_type.as_str())
        }

        fn spawn_transient(
            &self,
            entity_type: &EntityTypeTag,
            _near: &Mob,
        ) -> Result<Mob, CaptureError> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            if !self.spawn_delay.is_zero() {
                thread::sleep(self.spawn_delay);
            }
            if self.broken_types.lock().iter().any(|t| t == entity_type.as_str()) {
                return Err(CaptureError::SpawnFailed {
                    entity_type: entity_type.clone(),
                    reason: "chunk not loaded".to_string(),
                });
            }
            let defaults = self.defaults[entity_type.as_str()].clone();
            Ok(Mob {
                kind: entity_type.clone(),
                state: defaults,
            })
        }

        fn capture(&self, entity: &Mob) -> Result<AttributeTree, CaptureError> {
            Ok(entity.state.clone())
        }
    }
}

use world::{Mob, World};

fn cache(max_size: u64) -> Arc<DefaultStateCache> {
    Arc::new(DefaultStateCache::new(CacheConfig {
        max_size,
        record_stats: true,
        ..Default::default()
    }))
}

// ============================================================================
// Baseline Sampling Tests
// ============================================================================

#[test]
fn test_compacts_against_type_defaults() {
    let compactor = EntityCompactor::new(World::new(), cache(10));

    let cow = Mob::new(
        "cow",
        AttributeTree::new()
            .with("Age", Tag::Int(-24000))
            .with("Health", Tag::Float(6.0))
            .with("Motion", Tag::List(vec![Tag::Double(0.1); 3]))
            .with("Brain", AttributeTree::new().with("memories", AttributeTree::new())),
    );

    let delta = compactor.process_entity(&cow).unwrap().unwrap();
    assert_eq!(delta, AttributeTree::new().with("Age", Tag::Int(-24000)));
}

#[test]
fn test_default_entity_compacts_to_nothing() {
    let world = World::new();
    let zombie = Mob::new("zombie", world.defaults["zombie"].clone());
    let compactor = EntityCompactor::new(world, cache(10));

    let delta = compactor.process_entity(&zombie).unwrap().unwrap();
    assert!(delta.is_empty());
}

#[test]
fn test_concurrent_misses_sample_once() {
    let compactor = Arc::new(EntityCompactor::new(
        World::new().with_spawn_delay(Duration::from_millis(20)),
        cache(10),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let compactor = Arc::clone(&compactor);
            thread::spawn(move || {
                let cow = Mob::new("cow", AttributeTree::new().with("Age", Tag::Int(i)));
                compactor.process_entity(&cow).unwrap().unwrap()
            })
        })
        .collect();

    for handle in handles {
        let delta = handle.join().unwrap();
        assert!(delta.contains_key("Age") || delta.is_empty());
    }

    assert_eq!(compactor.host().spawns(), 1);
    let stats = compactor.cache().stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.hits + stats.misses, 8);
}

#[test]
fn test_capture_fault_writes_no_entry() {
    let world = World::new();
    world.broken_types.lock().push("cow".to_string());
    let compactor = EntityCompactor::new(world, cache(10));

    let cow = Mob::new("cow", AttributeTree::new());
    let err = compactor.process_entity(&cow).unwrap_err();
    assert!(matches!(err, CaptureError::SpawnFailed { .. }));
    assert!(compactor.cache().is_empty());
    assert_eq!(compactor.cache().stats().load_failures, 1);

    // Once the host recovers, the next call samples and caches
    compactor.host().broken_types.lock().clear();
    assert!(compactor.process_entity(&cow).unwrap().is_some());
    assert_eq!(compactor.cache().len(), 1);
}

#[test]
fn test_evicted_baseline_is_resampled() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let listener: RemovalListener = Arc::new(
        move |entity_type: &EntityTypeTag, _: &AttributeTree, cause: RemovalCause| {
            sink.lock().push((entity_type.to_string(), cause));
        },
    );
    let cache = Arc::new(
        DefaultStateCache::new(CacheConfig {
            max_size: 1,
            ..Default::default()
        })
        .with_removal_listener(listener),
    );
    let compactor = EntityCompactor::new(World::new(), cache);

    let cow = Mob::new("cow", AttributeTree::new());
    let zombie = Mob::new("zombie", AttributeTree::new());

    compactor.process_entity(&cow).unwrap();
    compactor.process_entity(&zombie).unwrap();
    compactor.process_entity(&cow).unwrap();

    assert_eq!(compactor.host().spawns(), 3);
    assert_eq!(
        events.lock().as_slice(),
        &[
            ("cow".to_string(), RemovalCause::Size),
            ("zombie".to_string(), RemovalCause::Size),
        ]
    );
}

#[test]
fn test_custom_rejects() {
    let compactor = EntityCompactor::with_rejects(
        World::new(),
        cache(10),
        RejectKeySet::new(["IsBaby"]),
    );
    let zombie = Mob::new(
        "zombie",
        AttributeTree::new()
            .with("IsBaby", Tag::Byte(1))
            .with("Health", Tag::Float(3.0)),
    );

    let delta = compactor.process_entity(&zombie).unwrap().unwrap();
    assert_eq!(delta, AttributeTree::new().with("Health", Tag::Float(3.0)));
}

// ============================================================================
// Property Tests
// ============================================================================

fn live_cow_strategy() -> impl Strategy<Value = AttributeTree> {
    (any::<i32>(), any::<f32>(), prop::option::of("[A-Za-z]{1,8}")).prop_map(
        |(age, health, name)| {
            let mut tree = AttributeTree::new()
                .with("Age", Tag::Int(age))
                .with("Health", Tag::Float(health));
            if let Some(name) = name {
                tree.insert("CustomName", name.as_str());
            }
            tree
        },
    )
}

proptest! {
    #[test]
    fn repeated_compaction_is_stable(state in live_cow_strategy()) {
        let compactor = EntityCompactor::new(World::new(), cache(10));
        let cow = Mob::new("cow", state);

        let first = compactor.process_entity(&cow).unwrap().unwrap();
        let second = compactor.process_entity(&cow).unwrap().unwrap();

        prop_assert!(first.same_value(&second));
        prop_assert!(!first.contains_key("Health"));
        prop_assert_eq!(compactor.host().spawns(), 1);
    }
}
