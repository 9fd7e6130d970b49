//! Entity compaction walkthrough against a scripted host.

use lode_compaction::{
    CacheConfig, CacheRegistry, CaptureError, DefaultStateCache, EntityCompactor, EntityHost,
};
use lode_core::{AttributeTree, EntityTypeTag, Tag};
use std::collections::BTreeMap;
use std::sync::Arc;

/// An entity as the scripted host sees it.
#[derive(Clone, Debug)]
pub struct ScriptedEntity {
    pub entity_type: EntityTypeTag,
    pub state: AttributeTree,
}

/// Host whose transient instances come from a fixed table of defaults.
pub struct ScriptedHost {
    defaults: BTreeMap<String, AttributeTree>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert(
            "sheep".to_string(),
            AttributeTree::new()
                .with("Age", Tag::Int(0))
                .with("Color", Tag::Byte(0))
                .with("Sheared", Tag::Byte(0))
                .with("Health", Tag::Float(8.0))
                .with("Motion", Tag::List(vec![Tag::Double(0.0); 3]))
                .with("OnGround", Tag::Byte(1))
                .with(
                    "ArmorItems",
                    Tag::List(vec![Tag::Compound(AttributeTree::new()); 4]),
                ),
        );
        defaults.insert(
            "villager".to_string(),
            AttributeTree::new()
                .with("Xp", Tag::Int(0))
                .with("Health", Tag::Float(20.0))
                .with(
                    "VillagerData",
                    AttributeTree::new()
                        .with("level", Tag::Int(1))
                        .with("profession", "minecraft:none")
                        .with("type", "minecraft:plains"),
                ),
        );
        ScriptedHost { defaults }
    }

    fn entities(&self) -> Vec<ScriptedEntity> {
        vec![
            ScriptedEntity {
                entity_type: EntityTypeTag::new("sheep"),
                state: AttributeTree::new()
                    .with("Age", Tag::Int(0))
                    .with("Color", Tag::Byte(14))
                    .with("Sheared", Tag::Byte(0))
                    .with("Health", Tag::Float(3.5))
                    .with("Motion", Tag::List(vec![Tag::Double(0.02); 3]))
                    .with("OnGround", Tag::Byte(0))
                    .with(
                        "ArmorItems",
                        Tag::List(vec![
                            Tag::Compound(AttributeTree::new()),
                            Tag::Compound(AttributeTree::new()),
                            Tag::Compound(
                                AttributeTree::new()
                                    .with("id", "minecraft:leather_chestplate")
                                    .with("Count", Tag::Byte(1)),
                            ),
                            Tag::Compound(AttributeTree::new()),
                        ]),
                    )
                    .with("CustomName", "Dolly"),
            },
            ScriptedEntity {
                entity_type: EntityTypeTag::new("sheep"),
                state: self.defaults["sheep"].clone(),
            },
            ScriptedEntity {
                entity_type: EntityTypeTag::new("villager"),
                state: AttributeTree::new()
                    .with("Xp", Tag::Int(42))
                    .with("Health", Tag::Float(20.0))
                    .with(
                        "VillagerData",
                        AttributeTree::new()
                            .with("level", Tag::Int(3))
                            .with("profession", "minecraft:librarian")
                            .with("type", "minecraft:plains"),
                    ),
            },
            ScriptedEntity {
                entity_type: EntityTypeTag::unknown(),
                state: AttributeTree::new().with("Mystery", Tag::Int(1)),
            },
        ]
    }
}

impl EntityHost for ScriptedHost {
    type Entity = ScriptedEntity;

    fn entity_type(&self, entity: &ScriptedEntity) -> EntityTypeTag {
        entity.entity_type.clone()
    }

    fn is_resolvable(&self, entity_type: &EntityTypeTag) -> bool {
        self.defaults.contains_key(entity_type.as_str())
    }

    fn spawn_transient(
        &self,
        entity_type: &EntityTypeTag,
        _near: &ScriptedEntity,
    ) -> Result<ScriptedEntity, CaptureError> {
        let state = self
            .defaults
            .get(entity_type.as_str())
            .cloned()
            .ok_or_else(|| CaptureError::SpawnFailed {
                entity_type: entity_type.clone(),
                reason: "no default registered".to_string(),
            })?;
        Ok(ScriptedEntity {
            entity_type: entity_type.clone(),
            state,
        })
    }

    fn capture(&self, entity: &ScriptedEntity) -> Result<AttributeTree, CaptureError> {
        Ok(entity.state.clone())
    }
}

/// Compact every scripted entity and print the stored form of each.
pub fn run_compaction_demo(config: CacheConfig) -> Result<(), CaptureError> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Entity Compaction Demo                              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let cache = Arc::new(DefaultStateCache::new(CacheConfig {
        record_stats: true,
        ..config
    }));
    let registry = CacheRegistry::new();
    registry.register("entityDefaults", cache.clone());

    let host = ScriptedHost::new();
    let entities = host.entities();
    let compactor = EntityCompactor::new(host, cache);

    for entity in &entities {
        let original = entity.state.to_string();
        match compactor.process_entity(entity)? {
            Some(compacted) => {
                println!("\n  {}", entity.entity_type);
                println!("    live      ({:>4} bytes): {}", original.len(), original);
                println!("    stored    ({:>4} bytes): {}", compacted.serialized_len(), compacted);
            }
            None => {
                println!("\n  {} (not compacted)", entity.entity_type);
                println!("    stored    ({:>4} bytes): {}", original.len(), original);
            }
        }
    }

    let stats = compactor.stats();
    println!("\n  Compacted: {} | Skipped: {}", stats.compacted, stats.skipped);
    println!("  Bytes: {} -> {}", stats.bytes_before, stats.bytes_after);

    for summary in registry.report() {
        println!(
            "  Cache {}: {} entries, {} hits, {} misses, {} loads",
            summary.name,
            summary.entries,
            summary.stats.hits,
            summary.stats.misses,
            summary.stats.loads
        );
    }

    Ok(())
}
