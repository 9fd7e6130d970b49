//! # Lode Purge
//!
//! Batched, self-scheduling deletion of audit records.
//!
//! Large retention purges are split into bounded primary key windows so a
//! single delete never locks the whole activity table. Each cycle deletes
//! one window and schedules its successor after a configurable delay.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lode_purge::{ActivityQuery, MemoryActivityStore, PurgeConfig, PurgeQueue, TokioScheduler};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), lode_purge::PurgeError> {
//! let store = Arc::new(MemoryActivityStore::new());
//! let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
//!
//! let queue = PurgeQueue::builder(store, scheduler)
//!     .config(PurgeConfig::default())
//!     .on_cycle(|cycle| println!("deleted {}", cycle.deleted))
//!     .on_end(|result| println!("done: {}", result.deleted))
//!     .build()?;
//!
//! queue.add(ActivityQuery::new().before(1_700_000_000));
//! queue.start()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod queue;
pub mod scheduler;
pub mod store;

pub use config::{CycleDelay, PurgeConfig, PurgeConfigBuilder, DEFAULT_CYCLE_DELAY, DEFAULT_LIMIT};
pub use queue::{
    PurgeCycleResult, PurgeError, PurgeQueue, PurgeQueueBuilder, PurgeResult, PurgeStatus,
};
pub use scheduler::{Task, TaskScheduler, TokioScheduler};
pub use store::{
    Activity, ActivityQuery, ActivityStore, DeleteWindow, KeyBounds, MemoryActivityStore,
    StoreError,
};
