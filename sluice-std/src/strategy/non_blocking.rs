use sluice_core::{
    ChainBuilder, ConfigurationError, Context, DEFAULT_MAX_WORKERS, Dispatch, Element, Event,
    NameSource, ProcessingStrategy, RuntimeContext, StepDescriptor, StepFuture,
};
use std::sync::OnceLock;
use tracing::debug;

use super::{PoolSnapshot, WorkerPool, is_worker_candidate};

/// Moves blocking steps to a worker pool when the event allows it.
///
/// A step is dispatched only if the event is not synchronous, allows
/// non-blocking processing, and the step is a plain blocking processor.
/// Everything else runs inline.
///
/// The pool is created during [`ProcessingStrategy::configure`], sized by
/// the explicit limit if one was given and by the runtime configuration
/// otherwise.
#[derive(Debug, Default)]
pub struct NonBlockingProcessingStrategy {
    max_workers: Option<usize>,
    pool: OnceLock<WorkerPool>,
}

impl NonBlockingProcessingStrategy {
    /// Creates a strategy sized by the runtime configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a strategy with an explicit worker limit.
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers: Some(max_workers),
            pool: OnceLock::new(),
        }
    }

    /// The worker pool, once configured.
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.get()
    }

    /// The pool's counters. All zero before configuration.
    pub fn stats(&self) -> PoolSnapshot {
        self.pool().map(WorkerPool::stats).unwrap_or_default()
    }

    fn pool_or_default(&self) -> &WorkerPool {
        self.pool.get_or_init(|| {
            WorkerPool::new("non-blocking", self.max_workers.unwrap_or(DEFAULT_MAX_WORKERS))
        })
    }
}

impl ProcessingStrategy for NonBlockingProcessingStrategy {
    fn name(&self) -> &str {
        "non-blocking"
    }

    fn configure(
        &self,
        elements: Vec<Element>,
        names: &dyn NameSource,
        builder: &mut ChainBuilder,
        runtime: &RuntimeContext,
    ) -> Result<(), ConfigurationError> {
        let max_workers = self.max_workers.unwrap_or(runtime.config().max_workers);
        if max_workers == 0 {
            return Err(ConfigurationError::Strategy {
                strategy: self.name().to_string(),
                reason: "max_workers must be at least 1".to_string(),
            });
        }

        let name = names.next_name();
        if self.pool.set(WorkerPool::new(name.as_str(), max_workers)).is_err() {
            return Err(ConfigurationError::Strategy {
                strategy: self.name().to_string(),
                reason: "already configured for another flow".to_string(),
            });
        }
        debug!(pool = %name, max_workers, "worker pool configured");

        builder.extend(elements);
        Ok(())
    }

    fn dispatch(&self, step: &StepDescriptor, event: &Event) -> Dispatch {
        if event.allow_non_blocking() && is_worker_candidate(step) {
            Dispatch::Worker
        } else {
            Dispatch::Inline
        }
    }

    fn submit(&self, step: &StepDescriptor, event: &Event, task: StepFuture, cx: &Context) -> StepFuture {
        self.pool_or_default().submit(step, event, task, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StageNames;
    use sluice_core::{Capabilities, RuntimeConfig};

    fn step(capabilities: Capabilities) -> StepDescriptor {
        let chain = ChainBuilder::new()
            .processor(crate::testing::Appending::new("x"))
            .build()
            .unwrap();
        StepDescriptor {
            processor: chain.steps().next().unwrap().info().clone(),
            capabilities,
            position: 0,
        }
    }

    #[test]
    fn dispatches_only_blocking_steps_of_permissive_events() {
        let strategy = NonBlockingProcessingStrategy::new();
        let permissive = Event::builder("x").allow_non_blocking(true).build();
        let synchronous = Event::builder("x").allow_non_blocking(true).synchronous(true).build();

        assert_eq!(strategy.dispatch(&step(Capabilities::BLOCKING), &permissive), Dispatch::Worker);
        assert_eq!(strategy.dispatch(&step(Capabilities::BLOCKING), &synchronous), Dispatch::Inline);
        assert_eq!(strategy.dispatch(&step(Capabilities::BLOCKING), &Event::new("x")), Dispatch::Inline);
        assert_eq!(strategy.dispatch(&step(Capabilities::NON_BLOCKING), &permissive), Dispatch::Inline);
        assert_eq!(
            strategy.dispatch(&step(Capabilities::BLOCKING | Capabilities::INTERCEPTING), &permissive),
            Dispatch::Inline
        );
    }

    #[test]
    fn configure_names_and_sizes_the_pool() {
        let strategy = NonBlockingProcessingStrategy::new();
        let runtime = RuntimeContext::new(RuntimeConfig::default().with_max_workers(3));
        let mut builder = ChainBuilder::new();

        strategy
            .configure(Vec::new(), &StageNames::new("orders"), &mut builder, &runtime)
            .unwrap();

        let pool = strategy.pool().unwrap();
        assert_eq!(pool.name(), "orders.stage1");
        assert_eq!(pool.max_workers(), 3);

        let again = strategy.configure(Vec::new(), &StageNames::new("other"), &mut builder, &runtime);
        assert!(matches!(again, Err(ConfigurationError::Strategy { .. })));
    }

    #[test]
    fn zero_workers_is_a_configuration_error() {
        let strategy = NonBlockingProcessingStrategy::with_max_workers(0);
        let err = strategy
            .configure(Vec::new(), &StageNames::new("f"), &mut ChainBuilder::new(), &RuntimeContext::default())
            .unwrap_err();

        assert!(err.to_string().contains("max_workers"));
    }
}
