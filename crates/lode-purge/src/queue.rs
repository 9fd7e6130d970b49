//! Batched purge queue.
//!
//! A [`PurgeQueue`] holds retention queries and works through them one at a
//! time. For the active query it deletes one bounded primary key window per
//! cycle, reports the cycle, and schedules the next cycle after the
//! configured delay. When the last window of a query has been deleted the
//! query is removed and the next one is activated with fresh bounds. An
//! empty queue ends the run and reports the total.

use crate::config::PurgeConfig;
use crate::scheduler::TaskScheduler;
use crate::store::{ActivityStore, KeyBounds, StoreError};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by purge queues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PurgeError {
    #[error("Purge queue is empty")]
    EmptyQueue,

    #[error("Purge queue is already running")]
    AlreadyRunning,

    #[error("Purge queue is stopping; a batch is still in flight")]
    Stopping,

    #[error("Invalid purge configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of one delete batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurgeCycleResult {
    pub deleted: u64,
    pub min_primary_key: i64,
    pub max_primary_key: i64,
}

/// Outcome of a whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurgeResult {
    pub deleted: u64,
}

/// Snapshot of a queue's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurgeStatus {
    pub running: bool,
    pub pending: usize,
    pub deleted: u64,
}

type CycleCallback = Box<dyn Fn(PurgeCycleResult) + Send + Sync>;
type EndCallback = Box<dyn Fn(PurgeResult) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&PurgeError) + Send + Sync>;

fn validate(config: &PurgeConfig) -> Result<(), PurgeError> {
    if config.limit == 0 {
        return Err(PurgeError::InvalidConfig(
            "limit must be greater than zero".to_string(),
        ));
    }
    if i64::try_from(config.limit).is_err() {
        return Err(PurgeError::InvalidConfig(format!(
            "limit {} exceeds the primary key range",
            config.limit
        )));
    }
    Ok(())
}

/// Builder for purge queues.
pub struct PurgeQueueBuilder<S: ActivityStore> {
    store: Arc<S>,
    scheduler: Arc<dyn TaskScheduler>,
    config: PurgeConfig,
    on_cycle: CycleCallback,
    on_end: EndCallback,
    on_error: Option<ErrorCallback>,
}

impl<S: ActivityStore> PurgeQueueBuilder<S> {
    pub fn new(store: Arc<S>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            store,
            scheduler,
            config: PurgeConfig::default(),
            on_cycle: Box::new(|_| {}),
            on_end: Box::new(|_| {}),
            on_error: None,
        }
    }

    pub fn config(mut self, config: PurgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Called after every completed delete batch.
    pub fn on_cycle(mut self, callback: impl Fn(PurgeCycleResult) + Send + Sync + 'static) -> Self {
        self.on_cycle = Box::new(callback);
        self
    }

    /// Called once when the queue drains.
    pub fn on_end(mut self, callback: impl Fn(PurgeResult) + Send + Sync + 'static) -> Self {
        self.on_end = Box::new(callback);
        self
    }

    /// Called when a store fault stops the run.
    pub fn on_error(mut self, callback: impl Fn(&PurgeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<PurgeQueue<S>, PurgeError> {
        validate(&self.config)?;

        Ok(PurgeQueue {
            inner: Arc::new(Inner {
                store: self.store,
                scheduler: self.scheduler,
                config: RwLock::new(self.config),
                pending: Mutex::new(VecDeque::new()),
                state: Mutex::new(RunState::default()),
                deleted: AtomicU64::new(0),
                on_cycle: self.on_cycle,
                on_end: self.on_end,
                on_error: self.on_error,
            }),
        })
    }
}

/// FIFO queue of retention queries purged in bounded batches.
pub struct PurgeQueue<S: ActivityStore> {
    inner: Arc<Inner<S>>,
}

impl<S: ActivityStore> Clone for PurgeQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ActivityStore> PurgeQueue<S> {
    pub fn builder(store: Arc<S>, scheduler: Arc<dyn TaskScheduler>) -> PurgeQueueBuilder<S> {
        PurgeQueueBuilder::new(store, scheduler)
    }

    /// Append a query. Allowed while running.
    pub fn add(&self, query: S::Query) {
        tracing::debug!(query = ?query, "Queued purge");
        self.inner.pending.lock().push_back(query);
    }

    /// Begin processing pending queries.
    ///
    /// The first cycle runs asynchronously; this call returns immediately.
    /// After [`stop`](Self::stop) the queue cannot be restarted until the
    /// in-flight batch, if any, has completed.
    pub fn start(&self) -> Result<(), PurgeError> {
        if self.inner.pending.lock().is_empty() {
            return Err(PurgeError::EmptyQueue);
        }

        let generation = {
            let mut state = self.inner.state.lock();
            if state.running {
                return Err(PurgeError::AlreadyRunning);
            }
            if state.active > 0 {
                return Err(PurgeError::Stopping);
            }
            state.running = true;
            state.generation += 1;
            state.generation
        };
        tracing::info!(
            pending = self.pending_len(),
            generation,
            "Starting purge queue"
        );

        let inner = Arc::clone(&self.inner);
        self.inner
            .scheduler
            .run_async(inner.execute_next(generation, None));
        Ok(())
    }

    /// Stop after any in-flight batch. Pending queries and the deleted total
    /// are kept; the end callback is not invoked.
    pub fn stop(&self) {
        let was_running = std::mem::replace(&mut self.inner.state.lock().running, false);
        if was_running {
            tracing::info!(pending = self.pending_len(), "Stopping purge queue");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Whether a cycle of this queue is executing right now.
    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().active > 0
    }

    /// Records deleted by every completed batch so far.
    pub fn deleted_total(&self) -> u64 {
        self.inner.deleted.load(Ordering::SeqCst)
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Snapshot of the pending queries, active query first.
    pub fn pending(&self) -> Vec<S::Query> {
        self.inner.pending.lock().iter().cloned().collect()
    }

    pub fn status(&self) -> PurgeStatus {
        PurgeStatus {
            running: self.is_running(),
            pending: self.pending_len(),
            deleted: self.deleted_total(),
        }
    }

    pub fn config(&self) -> PurgeConfig {
        self.inner.config.read().clone()
    }

    /// Replace the configuration. Takes effect from the next cycle.
    pub fn update_config(&self, config: PurgeConfig) -> Result<(), PurgeError> {
        validate(&config)?;
        *self.inner.config.write() = config;
        Ok(())
    }
}

/// Lifecycle flags, changed together under one lock.
#[derive(Default)]
struct RunState {
    running: bool,
    /// Incremented by every start; stale cycle chains compare against it.
    generation: u64,
    /// Cycles currently executing.
    active: usize,
}

struct Inner<S: ActivityStore> {
    store: Arc<S>,
    scheduler: Arc<dyn TaskScheduler>,
    config: RwLock<PurgeConfig>,
    pending: Mutex<VecDeque<S::Query>>,
    state: Mutex<RunState>,
    deleted: AtomicU64,
    on_cycle: CycleCallback,
    on_end: EndCallback,
    on_error: Option<ErrorCallback>,
}

impl<S: ActivityStore> Inner<S> {
    /// Enter a cycle of `generation` if it is still the live run.
    fn enter(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if !state.running || state.generation != generation {
            return false;
        }
        state.active += 1;
        true
    }

    fn exit(&self) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
    }

    fn front(&self) -> Option<S::Query> {
        self.pending.lock().front().cloned()
    }

    /// Run one cycle. `window` is `(cycle_min, absolute_max)` for the active
    /// query, or `None` to activate the front query.
    fn execute_next(self: Arc<Self>, generation: u64, window: Option<(i64, i64)>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if !self.enter(generation) {
                return;
            }
            if let Err(err) = Arc::clone(&self).cycle(generation, window).await {
                self.fail(generation, err);
            }
            self.exit();
        })
    }

    async fn cycle(
        self: Arc<Self>,
        generation: u64,
        window: Option<(i64, i64)>,
    ) -> Result<(), PurgeError> {
        let Some(query) = self.front() else {
            self.finish(generation);
            return Ok(());
        };

        let (cycle_min, absolute_max) = match window {
            Some(window) => window,
            None => match self.store.primary_key_bounds(&query).await? {
                Some(KeyBounds { min, max }) if min <= max => {
                    tracing::debug!(
                        query = ?query,
                        absolute_min = min,
                        absolute_max = max,
                        "Activated purge query"
                    );
                    (min, max)
                }
                _ => {
                    tracing::info!(query = ?query, "No records match purge query, skipping");
                    self.pending.lock().pop_front();
                    self.scheduler
                        .run_async(Arc::clone(&self).execute_next(generation, None));
                    return Ok(());
                }
            },
        };

        let config = self.config.read().clone();
        // Validated on build and update
        let limit = i64::try_from(config.limit).unwrap_or(i64::MAX);
        let delay = config.cycle_delay();

        let cycle_max = cycle_min.saturating_add(limit - 1).min(absolute_max);
        tracing::debug!(
            min_primary_key = cycle_min,
            max_primary_key = cycle_max,
            "Executing purge cycle"
        );

        let deleted = self
            .store
            .delete_activities(&query, cycle_min, cycle_max)
            .await?;
        self.deleted.fetch_add(deleted, Ordering::SeqCst);

        // A stop during the delete does not suppress the report; the next
        // cycle exits instead
        (self.on_cycle)(PurgeCycleResult {
            deleted,
            min_primary_key: cycle_min,
            max_primary_key: cycle_max,
        });
        tracing::info!(
            deleted,
            min_primary_key = cycle_min,
            max_primary_key = cycle_max,
            "Purged activity records"
        );

        let next_min = cycle_min.saturating_add(limit);
        let next = if next_min >= absolute_max {
            self.pending.lock().pop_front();
            None
        } else {
            Some((next_min, absolute_max))
        };

        tracing::debug!(delay = ?delay, next = ?next, "Scheduling next purge cycle");
        self.scheduler
            .schedule(delay, Arc::clone(&self).execute_next(generation, next));
        Ok(())
    }

    fn finish(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation != generation || !state.running {
                return;
            }
            state.running = false;
        }

        let deleted = self.deleted.load(Ordering::SeqCst);
        tracing::info!(deleted, "Purge queue drained");
        (self.on_end)(PurgeResult { deleted });
    }

    fn fail(&self, generation: u64, err: PurgeError) {
        tracing::error!(error = %err, generation, "Purge cycle failed");

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.running = false;
        }
        if let Some(on_error) = &self.on_error {
            on_error(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TokioScheduler;
    use crate::store::{ActivityQuery, MemoryActivityStore};

    fn queue(limit: u64) -> Result<PurgeQueue<MemoryActivityStore>, PurgeError> {
        let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
        PurgeQueue::builder(Arc::new(MemoryActivityStore::new()), scheduler)
            .config(PurgeConfig {
                limit,
                cycle_delay: None,
            })
            .build()
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        assert!(matches!(queue(0), Err(PurgeError::InvalidConfig(_))));
        assert!(matches!(
            queue(u64::MAX),
            Err(PurgeError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_start_on_empty_queue() {
        let queue = queue(10).unwrap();
        assert_eq!(queue.start(), Err(PurgeError::EmptyQueue));
        assert!(!queue.is_running());
    }

    #[tokio::test]
    async fn test_update_config_validates() {
        let queue = queue(10).unwrap();
        assert!(queue
            .update_config(PurgeConfig {
                limit: 0,
                cycle_delay: None
            })
            .is_err());
        assert_eq!(queue.config().limit, 10);

        queue
            .update_config(PurgeConfig {
                limit: 25,
                cycle_delay: None,
            })
            .unwrap();
        assert_eq!(queue.config().limit, 25);
    }

    #[tokio::test]
    async fn test_status_reflects_pending() {
        let queue = queue(10).unwrap();
        queue.add(ActivityQuery::new().in_world("world"));
        queue.add(ActivityQuery::new().before(10));

        assert_eq!(
            queue.status(),
            PurgeStatus {
                running: false,
                pending: 2,
                deleted: 0
            }
        );
        assert_eq!(queue.pending()[0], ActivityQuery::new().in_world("world"));
    }
}
