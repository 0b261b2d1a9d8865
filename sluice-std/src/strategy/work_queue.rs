use sluice_core::{
    ChainBuilder, ConfigurationError, Context, DEFAULT_MAX_WORKERS, Dispatch, Element, Event,
    NameSource, ProcessingStrategy, RuntimeContext, StepDescriptor, StepFuture,
};
use std::sync::OnceLock;

use super::{PoolSnapshot, WorkerPool, is_worker_candidate};

/// Moves every blocking step to a worker pool unless the event is synchronous.
///
/// Unlike [`NonBlockingProcessingStrategy`](super::NonBlockingProcessingStrategy),
/// the event does not have to opt in.
#[derive(Debug, Default)]
pub struct WorkQueueProcessingStrategy {
    pool: OnceLock<WorkerPool>,
}

impl WorkQueueProcessingStrategy {
    /// Creates a strategy sized by the runtime configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// The pool's counters. All zero before configuration.
    pub fn stats(&self) -> PoolSnapshot {
        self.pool.get().map(WorkerPool::stats).unwrap_or_default()
    }
}

impl ProcessingStrategy for WorkQueueProcessingStrategy {
    fn name(&self) -> &str {
        "work-queue"
    }

    fn configure(
        &self,
        elements: Vec<Element>,
        names: &dyn NameSource,
        builder: &mut ChainBuilder,
        runtime: &RuntimeContext,
    ) -> Result<(), ConfigurationError> {
        let pool = WorkerPool::new(names.next_name(), runtime.config().max_workers);
        self.pool.set(pool).map_err(|_| ConfigurationError::Strategy {
            strategy: self.name().to_string(),
            reason: "already configured for another flow".to_string(),
        })?;
        builder.extend(elements);
        Ok(())
    }

    fn dispatch(&self, step: &StepDescriptor, event: &Event) -> Dispatch {
        if !event.is_synchronous() && is_worker_candidate(step) {
            Dispatch::Worker
        } else {
            Dispatch::Inline
        }
    }

    fn submit(&self, step: &StepDescriptor, event: &Event, task: StepFuture, cx: &Context) -> StepFuture {
        self.pool
            .get_or_init(|| WorkerPool::new("work-queue", DEFAULT_MAX_WORKERS))
            .submit(step, event, task, cx)
    }
}
