//! Processor chains.
//!
//! A [`Chain`] is an ordered, immutable composition of steps. Running it
//! threads an event through each step in turn:
//!
//! - a value replaces the current event
//! - a void result leaves the current event in place
//! - an empty result or a failure ends the chain
//!
//! An intercepting step receives every step after it as its [`Next`](crate::Next)
//! and its own outcome stands for all of them.
//!
//! Chains are processors, so they nest. Whatever happens inside a nested
//! chain (an interceptor declining to proceed, say) stays inside it, apart
//! from empty results and failures, which end the enclosing chain too.
//! An interceptor that never calls `next` only cuts short the rest of its
//! own chain, and the nested chain answers with the interceptor's outcome.
//! An empty outcome is different: it travels out through every enclosing
//! chain.

mod builder;
pub(crate) mod plan;

pub use builder::{ChainBuilder, Element, ProcessorBuilder};

use std::{borrow::Cow, fmt, sync::Arc};

use crate::{
    component::{Capabilities, Component},
    context::{Context, FlowConstruct, RuntimeContext},
    error::{BoxError, ConfigurationError},
    event::Event,
    lifecycle::{Lifecycle, LifecycleCoordinator},
    outcome::Outcome,
    processor::Processor,
};
use plan::Plan;

/// A compiled, immutable sequence of processors.
///
/// Cloning shares the compiled plan and every processor in it.
#[derive(Clone)]
pub struct Chain {
    plan: Arc<Plan>,
    lifecycle: LifecycleCoordinator,
}

impl Chain {
    /// Starts building a chain.
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// A chain around a single processor.
    pub fn from_single<P: Processor>(processor: P) -> Chain {
        let component = Component::Processor(crate::component::ProcessorRef::new(processor));
        Self::from_plan(Plan::compile(None, vec![component]))
    }

    /// A chain around several elements, in order.
    pub fn from_many<E: Into<Element>>(
        elements: impl IntoIterator<Item = E>,
    ) -> Result<Chain, ConfigurationError> {
        ChainBuilder::new().chain_all(elements).build()
    }

    pub(crate) fn from_plan(plan: Plan) -> Self {
        let lifecycle = LifecycleCoordinator::new(plan.components().cloned().collect());
        Self {
            plan: Arc::new(plan),
            lifecycle,
        }
    }

    /// The chain's name, if it was given one.
    pub fn name(&self) -> Option<&str> {
        self.plan.name()
    }

    /// Number of top-level steps.
    pub fn len(&self) -> usize {
        self.plan.len()
    }

    /// Returns `true` if the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.plan.len() == 0
    }

    /// Top-level steps in order.
    pub fn steps(&self) -> impl Iterator<Item = &Component> {
        self.plan.components()
    }

    /// Lifecycle driver for the chain's steps.
    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.lifecycle
    }

    /// Runs `event` through the chain.
    ///
    /// Never returns [`Outcome::Void`]. An empty chain hands the event
    /// straight back.
    pub async fn run(&self, event: Event, cx: &Context) -> Outcome {
        self.plan.run(self.plan.head(), event, cx).await
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name())
            .field("steps", &self.steps().map(Component::name).collect::<Vec<_>>())
            .finish()
    }
}

impl Processor for Chain {
    async fn process(&self, event: Event, cx: &Context) -> Result<Outcome, BoxError> {
        Ok(self.run(event, cx).await)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(self.name().unwrap_or("chain").to_string())
    }

    // steps are dispatched individually
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }

    fn components(&self) -> Vec<Component> {
        self.steps().cloned().collect()
    }
}

impl Lifecycle for Chain {
    fn set_context(&self, context: &Arc<RuntimeContext>) {
        self.lifecycle.set_context(context);
    }

    fn set_flow(&self, flow: &Arc<dyn FlowConstruct>) {
        self.lifecycle.set_flow(flow);
    }

    fn initialise(&self) -> Result<(), BoxError> {
        Ok(self.lifecycle.initialise()?)
    }

    fn start(&self) -> Result<(), BoxError> {
        Ok(self.lifecycle.start()?)
    }

    fn stop(&self) -> Result<(), BoxError> {
        Ok(self.lifecycle.stop()?)
    }

    fn dispose(&self) -> Result<(), BoxError> {
        Ok(self.lifecycle.dispose()?)
    }
}
