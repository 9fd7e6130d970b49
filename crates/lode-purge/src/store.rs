//! Activity storage abstraction.
//!
//! The purge queue never talks to a database directly. It asks an
//! [`ActivityStore`] for the primary key range a query covers and then
//! deletes that range one window at a time.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Errors raised by an activity store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Primary key range covered by a query.
///
/// `min` is inclusive. A batch window reaching `max` completes the query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBounds {
    pub min: i64,
    pub max: i64,
}

impl KeyBounds {
    pub fn new(min: i64, max: i64) -> Self {
        KeyBounds { min, max }
    }
}

/// Storage backend for audit activity records.
#[async_trait]
pub trait ActivityStore: Send + Sync + 'static {
    /// Filter describing which records to delete.
    type Query: Clone + fmt::Debug + Send + Sync + 'static;

    /// Primary key bounds of the records matching `query`, or `None` when
    /// nothing matches.
    async fn primary_key_bounds(&self, query: &Self::Query)
        -> Result<Option<KeyBounds>, StoreError>;

    /// Delete matching records whose primary key lies in
    /// `[min_primary_key, max_primary_key]`. Returns the number removed.
    async fn delete_activities(
        &self,
        query: &Self::Query,
        min_primary_key: i64,
        max_primary_key: i64,
    ) -> Result<u64, StoreError>;
}

/// One recorded audit activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub world: String,
    pub action: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
}

/// Retention filter over activities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityQuery {
    pub world: Option<String>,
    /// Only records strictly older than this epoch second.
    pub before: Option<i64>,
    /// Only these actions. Empty means every action.
    pub actions: Vec<String>,
}

impl ActivityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_world(mut self, world: impl Into<String>) -> Self {
        self.world = Some(world.into());
        self
    }

    pub fn before(mut self, timestamp: i64) -> Self {
        self.before = Some(timestamp);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        if let Some(world) = &self.world {
            if &activity.world != world {
                return false;
            }
        }
        if let Some(before) = self.before {
            if activity.timestamp >= before {
                return false;
            }
        }
        self.actions.is_empty() || self.actions.iter().any(|a| a == &activity.action)
    }
}

impl fmt::Display for ActivityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(world) = &self.world {
            parts.push(format!("world={}", world));
        }
        if let Some(before) = self.before {
            parts.push(format!("before={}", before));
        }
        if !self.actions.is_empty() {
            parts.push(format!("actions={}", self.actions.join(",")));
        }
        if parts.is_empty() {
            write!(f, "<all>")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// A delete call observed by [`MemoryActivityStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeleteWindow {
    pub min_primary_key: i64,
    pub max_primary_key: i64,
    pub deleted: u64,
}

/// In-memory activity table keyed by auto-incrementing primary key.
///
/// Reported bounds are `(lowest matching key, highest matching key + 1)` so
/// that a window reaching `max` has already covered every matching row.
pub struct MemoryActivityStore {
    rows: RwLock<BTreeMap<i64, Activity>>,
    next_id: AtomicI64,
    deletes: Mutex<Vec<DeleteWindow>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        MemoryActivityStore {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            deletes: Mutex::new(Vec::new()),
        }
    }

    /// Append a record and return its primary key.
    pub fn insert(&self, world: impl Into<String>, action: impl Into<String>, timestamp: i64) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.write().insert(
            id,
            Activity {
                id,
                world: world.into(),
                action: action.into(),
                timestamp,
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.read().contains_key(&id)
    }

    pub fn count_matching(&self, query: &ActivityQuery) -> usize {
        self.rows.read().values().filter(|a| query.matches(a)).count()
    }

    /// Every delete call made so far, in order.
    pub fn delete_log(&self) -> Vec<DeleteWindow> {
        self.deletes.lock().clone()
    }
}

impl Default for MemoryActivityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    type Query = ActivityQuery;

    async fn primary_key_bounds(
        &self,
        query: &ActivityQuery,
    ) -> Result<Option<KeyBounds>, StoreError> {
        let rows = self.rows.read();
        let mut matching = rows.values().filter(|a| query.matches(a)).map(|a| a.id);
        let Some(min) = matching.next() else {
            return Ok(None);
        };
        let max = matching.last().unwrap_or(min);
        Ok(Some(KeyBounds::new(min, max.saturating_add(1))))
    }

    async fn delete_activities(
        &self,
        query: &ActivityQuery,
        min_primary_key: i64,
        max_primary_key: i64,
    ) -> Result<u64, StoreError> {
        if min_primary_key > max_primary_key {
            return Err(StoreError::QueryFailed(format!(
                "inverted key window {}-{}",
                min_primary_key, max_primary_key
            )));
        }

        let deleted = {
            let mut rows = self.rows.write();
            let doomed: Vec<i64> = rows
                .range(min_primary_key..=max_primary_key)
                .filter(|(_, a)| query.matches(a))
                .map(|(id, _)| *id)
                .collect();
            for id in &doomed {
                rows.remove(id);
            }
            doomed.len() as u64
        };

        self.deletes.lock().push(DeleteWindow {
            min_primary_key,
            max_primary_key,
            deleted,
        });
        Ok(deleted)
    }
}
