//! Bounded worker pool for dispatched steps.

use sluice_core::{Context, Event, Outcome, ProcessingError, StepDescriptor, StepFuture};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::{runtime::Handle, sync::Semaphore};
use tracing::{debug, trace, warn};

/// Counters describing what a pool has done so far.
#[derive(Debug, Default)]
struct PoolStats {
    scheduled: AtomicUsize,
    started: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
    discarded: AtomicUsize,
}

/// A point-in-time copy of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSnapshot {
    /// Steps handed to the pool.
    pub scheduled: usize,
    /// Steps that began running.
    pub started: usize,
    /// Steps that ran to completion.
    pub completed: usize,
    /// Steps dropped before starting because the flow had stopped.
    pub cancelled: usize,
    /// Results thrown away because the flow stopped while they ran.
    pub discarded: usize,
}

/// Runs steps on tokio tasks, at most `max_workers` at a time.
///
/// Cancelled and discarded steps resolve to [`Outcome::Empty`]. Outside a
/// tokio runtime, steps run in place on the caller's task.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: Arc<str>,
    max_workers: usize,
    permits: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Creates a pool. A `max_workers` of zero is treated as one.
    pub fn new(name: impl Into<String>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            name: Arc::from(name.into()),
            max_workers,
            permits: Arc::new(Semaphore::new(max_workers)),
            stats: Arc::default(),
        }
    }

    /// The pool's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The concurrency limit.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Current counters.
    pub fn stats(&self) -> PoolSnapshot {
        PoolSnapshot {
            scheduled: self.stats.scheduled.load(Ordering::Acquire),
            started: self.stats.started.load(Ordering::Acquire),
            completed: self.stats.completed.load(Ordering::Acquire),
            cancelled: self.stats.cancelled.load(Ordering::Acquire),
            discarded: self.stats.discarded.load(Ordering::Acquire),
        }
    }

    /// Schedules `task` and returns a future resolving to its outcome.
    pub fn submit(&self, step: &StepDescriptor, event: &Event, task: StepFuture, cx: &Context) -> StepFuture {
        let Ok(handle) = Handle::try_current() else {
            warn!(pool = %self.name, processor = %step.processor, "no tokio runtime, running step inline");
            return task;
        };

        self.stats.scheduled.fetch_add(1, Ordering::AcqRel);
        trace!(pool = %self.name, processor = %step.processor, event = %event.id(), "step scheduled");

        let permits = Arc::clone(&self.permits);
        let stats = Arc::clone(&self.stats);
        let pool = Arc::clone(&self.name);
        let processor = step.processor.clone();
        let cx = cx.clone();

        let join = handle.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            if cx.is_flow_stopped() {
                stats.cancelled.fetch_add(1, Ordering::AcqRel);
                debug!(%pool, %processor, "flow stopped before step started, cancelling");
                return None;
            }

            stats.started.fetch_add(1, Ordering::AcqRel);
            let outcome = task.await;
            stats.completed.fetch_add(1, Ordering::AcqRel);

            if cx.is_flow_stopped() {
                stats.discarded.fetch_add(1, Ordering::AcqRel);
                debug!(%pool, %processor, "flow stopped while step ran, discarding result");
                return None;
            }
            Some(outcome)
        });

        let processor = step.processor.clone();
        let event = event.clone();
        Box::pin(async move {
            match join.await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => Outcome::Empty,
                Err(err) => Outcome::failure(ProcessingError::new(Box::new(err), processor, event)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{Capabilities, ChainBuilder};

    fn descriptor() -> StepDescriptor {
        let chain = ChainBuilder::new()
            .processor(crate::testing::Appending::new("1"))
            .build()
            .unwrap();
        let step = chain.steps().next().unwrap();
        StepDescriptor {
            processor: step.info().clone(),
            capabilities: Capabilities::BLOCKING,
            position: 0,
        }
    }

    #[tokio::test]
    async fn runs_tasks_and_counts_them() {
        let pool = WorkerPool::new("test.pool", 2);
        let event = Event::new("x");
        let task: StepFuture = {
            let event = event.clone();
            Box::pin(async move { Outcome::Value(event.with_payload("y")) })
        };

        let outcome = pool.submit(&descriptor(), &event, task, &Context::detached()).await;

        assert_eq!(outcome.as_event().unwrap().payload_text(), "y");
        let stats = pool.stats();
        assert_eq!((stats.scheduled, stats.started, stats.completed), (1, 1, 1));
    }

    #[test]
    fn falls_back_to_inline_without_runtime() {
        let pool = WorkerPool::new("test.pool", 0);
        let event = Event::new("x");
        let task: StepFuture = Box::pin(async { Outcome::Void });

        let outcome = futures::executor::block_on(pool.submit(&descriptor(), &event, task, &Context::detached()));

        assert!(outcome.is_void());
        assert_eq!(pool.max_workers(), 1);
        assert_eq!(pool.stats(), PoolSnapshot::default());
    }

    async fn explode() -> Outcome {
        panic!("worker exploded")
    }

    #[tokio::test]
    async fn panicking_tasks_become_failures() {
        let pool = WorkerPool::new("test.pool", 1);
        let event = Event::new("x");
        let task: StepFuture = Box::pin(explode());

        let outcome = pool.submit(&descriptor(), &event, task, &Context::detached()).await;

        let failure = outcome.as_failure().unwrap();
        assert!(Event::ptr_eq(failure.event(), &event));
    }
}
