//! # lode-core
//!
//! Core value types for the Lodestone audit store.
//!
//! - [`tree`]: `AttributeTree`, the ordered, nested state of one entity
//! - [`entity`]: `EntityTypeTag`, the category key used by the baseline cache
//! - [`diff`]: the state differencer that strips baseline defaults and
//!   volatile keys before a snapshot is persisted
//! - [`duration`]: `(duration, unit)` pairs shared by cache and purge config
//!
//! ## Example
//!
//! ```rust
//! use lode_core::{compact, AttributeTree, RejectKeySet, Tag};
//!
//! let mut baseline = AttributeTree::new();
//! baseline.insert("Age", Tag::Int(0));
//! baseline.insert("Health", Tag::Float(10.0));
//!
//! let mut live = baseline.clone();
//! live.insert("Age", Tag::Int(12));
//! live.insert("Health", Tag::Float(4.5));
//!
//! let delta = compact(&live, &baseline, &RejectKeySet::default());
//! assert_eq!(delta.get("Age"), Some(&Tag::Int(12)));
//! assert!(!delta.contains_key("Health"));
//! ```

pub mod diff;
pub mod duration;
pub mod entity;
pub mod tree;

pub use diff::{compact, extract_difference, RejectKeySet, DEFAULT_REJECT_KEYS};
pub use duration::{DurationConfig, TimeUnit};
pub use entity::EntityTypeTag;
pub use tree::{AttributeTree, Tag, TagKind};
