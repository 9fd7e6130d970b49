//! Task scheduling seam.
//!
//! Purge cycles never block a thread while waiting for the next cycle.
//! Each cycle hands its successor to a [`TaskScheduler`] together with a
//! delay.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::runtime::Handle;

/// A unit of deferred work.
pub type Task = BoxFuture<'static, ()>;

/// Runs tasks off the caller's thread, now or after a delay.
pub trait TaskScheduler: Send + Sync + 'static {
    /// Run `task` as soon as possible.
    fn run_async(&self, task: Task);

    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: Task);
}

/// Scheduler backed by a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        TokioScheduler { handle }
    }

    /// Scheduler for the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl TaskScheduler for TokioScheduler {
    fn run_async(&self, task: Task) {
        self.handle.spawn(task);
    }

    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}
