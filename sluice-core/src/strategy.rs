//! Processing strategies: how a chain's steps are scheduled.
//!
//! A strategy is consulted twice. At build time, [`ProcessingStrategy::configure`]
//! places the flow's elements into a [`ChainBuilder`]. At run time, the
//! chain asks [`ProcessingStrategy::dispatch`] for every step and, when the
//! answer is [`Dispatch::Worker`], hands the step to
//! [`ProcessingStrategy::submit`]. Either way the step goes through the same
//! execution wrapper, so notifications and error wrapping do not depend on
//! where it runs.

use futures::future::BoxFuture;

use crate::{
    chain::{ChainBuilder, Element},
    component::{Capabilities, ProcessorInfo},
    context::{Context, RuntimeContext},
    error::ConfigurationError,
    event::Event,
    outcome::Outcome,
};

/// A step packaged for another task.
pub type StepFuture = BoxFuture<'static, Outcome>;

/// Where a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// On the caller's task.
    Inline,
    /// Through [`ProcessingStrategy::submit`].
    Worker,
}

/// What a strategy knows about a step. Resolved once, when the chain is built.
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    /// The step's processor.
    pub processor: ProcessorInfo,
    /// Its declared capabilities.
    pub capabilities: Capabilities,
    /// Position within its chain.
    pub position: usize,
}

/// Hands out names for resources a strategy creates during `configure`.
pub trait NameSource: Send + Sync {
    /// A fresh name.
    fn next_name(&self) -> String;
}

/// Schedules a chain's steps.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a ProcessingStrategy",
    label = "this type does not implement `ProcessingStrategy`"
)]
pub trait ProcessingStrategy: Send + Sync + 'static {
    /// Name used in logs and configuration errors.
    fn name(&self) -> &str;

    /// Places `elements` into `builder`. The default keeps them as they are.
    fn configure(
        &self,
        elements: Vec<Element>,
        _names: &dyn NameSource,
        builder: &mut ChainBuilder,
        _runtime: &RuntimeContext,
    ) -> Result<(), ConfigurationError> {
        builder.extend(elements);
        Ok(())
    }

    /// Decides where a step runs. The default runs everything inline.
    fn dispatch(&self, _step: &StepDescriptor, _event: &Event) -> Dispatch {
        Dispatch::Inline
    }

    /// Runs a step dispatched to a worker. The default awaits it in place.
    fn submit(&self, _step: &StepDescriptor, _event: &Event, task: StepFuture, _cx: &Context) -> StepFuture {
        task
    }
}

/// Runs every step on the caller's task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynchronousStrategy;

impl ProcessingStrategy for SynchronousStrategy {
    fn name(&self) -> &str {
        "synchronous"
    }
}
