//! Processing strategies.
//!
//! - [`SynchronousStrategy`] - everything on the caller's task (re-exported
//!   from core, it is the default)
//! - [`NonBlockingProcessingStrategy`] - blocking steps of events that allow
//!   it move to a [`WorkerPool`]
//! - [`WorkQueueProcessingStrategy`] - every blocking step of an
//!   asynchronous event moves to a [`WorkerPool`]
//!
//! Intercepting steps always run inline: they hold on to the rest of the
//! chain, and occupying a worker while waiting on it could starve the pool.

mod non_blocking;
mod pool;
mod work_queue;

pub use non_blocking::NonBlockingProcessingStrategy;
pub use pool::{PoolSnapshot, WorkerPool};
pub use sluice_core::SynchronousStrategy;
pub use work_queue::WorkQueueProcessingStrategy;

use sluice_core::{Capabilities, NameSource, StepDescriptor};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Names resources after their flow: `orders.stage1`, `orders.stage2`, ...
#[derive(Debug)]
pub struct StageNames {
    prefix: String,
    counter: AtomicUsize,
}

impl StageNames {
    /// Creates a name source for `flow`.
    pub fn new(flow: &str) -> Self {
        Self {
            prefix: format!("{flow}.stage"),
            counter: AtomicUsize::new(1),
        }
    }
}

impl NameSource for StageNames {
    fn next_name(&self) -> String {
        format!("{}{}", self.prefix, self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

fn is_worker_candidate(step: &StepDescriptor) -> bool {
    let caps = step.capabilities;
    caps.contains(Capabilities::BLOCKING)
        && !caps.intersects(Capabilities::INTERCEPTING | Capabilities::NON_BLOCKING)
}
