//! Flows: named, owned chains.
//!
//! A [`Flow`] ties together a chain, the processing strategy that shaped
//! and schedules it, the runtime context, and a registry mapping every
//! reachable processor to a path such as `/orders/processors/1/0`. It is
//! the entry point callers hand events to.
//!
//! A flow may carry an [`ErrorHandler`]. Failures of its chain are handed
//! to it before the caller sees them, and its strategies' chains follow
//! the flow's lifecycle. Their paths live under `/orders/errorHandler`.

use parking_lot::RwLock;
use serde_json::Value;
use sluice_core::{
    Chain, ChainBuilder, Component, ConfigurationError, Context, Element, Event,
    FlowConstruct, Interceptor, LifecycleCoordinator, LifecycleError, Outcome,
    ProcessingStrategy, Processor, ProcessorId, RequestResponse, RuntimeContext, SluiceError,
    SynchronousStrategy,
};
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, info, trace, warn};

use crate::{error_handler::ErrorHandler, strategy::StageNames};

/// A named chain with its own strategy, runtime and lifecycle.
pub struct Flow {
    name: String,
    chain: Chain,
    strategy: Arc<dyn ProcessingStrategy>,
    runtime: Arc<RuntimeContext>,
    error_handler: Option<ErrorHandler>,
    handlers: LifecycleCoordinator,
    paths: RwLock<HashMap<ProcessorId, String>>,
    stopped: AtomicBool,
    this: Weak<Flow>,
}

impl Flow {
    /// Starts building a flow.
    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder::new(name)
    }

    /// The flow's chain.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The error handler, if one was configured.
    pub fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    /// The runtime this flow belongs to.
    pub fn runtime(&self) -> &Arc<RuntimeContext> {
        &self.runtime
    }

    /// Every registered `(processor, path)` pair, sorted by path.
    pub fn paths(&self) -> Vec<(ProcessorId, String)> {
        let mut paths: Vec<_> = self
            .paths
            .read()
            .iter()
            .map(|(id, path)| (*id, path.clone()))
            .collect();
        paths.sort_by(|a, b| a.1.cmp(&b.1));
        paths
    }

    /// Creates an event using the runtime's default exchange pattern.
    pub fn event(&self, payload: impl Into<Value>) -> Event {
        Event::builder(payload)
            .exchange_pattern(self.runtime.config().default_exchange_pattern)
            .build()
    }

    /// Injects context and flow into every processor, then initialises them.
    ///
    /// The chain goes first, the error handler's chains after it.
    pub fn initialise(&self) -> Result<(), LifecycleError> {
        let construct: Option<Arc<dyn FlowConstruct>> =
            self.this.upgrade().map(|this| this as Arc<dyn FlowConstruct>);
        for coordinator in [self.chain.coordinator(), &self.handlers] {
            coordinator.set_context(&self.runtime);
            if let Some(construct) = &construct {
                coordinator.set_flow(construct);
            }
        }
        self.chain.coordinator().initialise()?;
        self.handlers.initialise()?;
        debug!(flow = %self.name, "initialised");
        Ok(())
    }

    /// Starts every processor and accepts events.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.chain.coordinator().start()?;
        self.handlers.start()?;
        self.stopped.store(false, Ordering::Release);
        info!(flow = %self.name, strategy = self.strategy.name(), "started");
        Ok(())
    }

    /// Stops accepting events, then stops every processor.
    ///
    /// Dispatched steps that have not started yet are cancelled and
    /// results of steps still running are discarded.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.stopped.store(true, Ordering::Release);
        let handlers = self.handlers.stop();
        let chain = self.chain.coordinator().stop();
        info!(flow = %self.name, "stopped");
        handlers.and(chain)
    }

    /// Disposes every processor.
    pub fn dispose(&self) -> Result<(), LifecycleError> {
        self.stopped.store(true, Ordering::Release);
        let handlers = self.handlers.dispose();
        handlers.and(self.chain.coordinator().dispose())
    }

    /// Processes one event.
    ///
    /// Request-response events carrying a [`ReplyHandler`](sluice_core::ReplyHandler)
    /// have it called with the final outcome, after the error handler had
    /// its turn. A stopped flow does not process anything and returns
    /// [`Outcome::Empty`].
    pub async fn process(&self, event: Event) -> Outcome {
        if self.is_stopped() {
            warn!(flow = %self.name, event = %event.id(), "flow is stopped, event not processed");
            return Outcome::Empty;
        }
        let Some(this) = self.this.upgrade() else {
            return Outcome::Empty;
        };

        let cx = Context::for_flow(Arc::clone(&self.runtime), this);
        trace!(flow = %self.name, event = %event.id(), "processing");
        let outcome = match (self.chain.run(event.clone(), &cx).await, &self.error_handler) {
            (Outcome::Failure(failure), Some(handler)) => handler.handle(*failure, &cx).await,
            (outcome, _) => outcome,
        };

        if event.exchange_pattern().has_response() {
            if let Some(reply) = event.reply_to() {
                reply.on_reply(&outcome);
            }
        }
        outcome
    }
}

impl FlowConstruct for Flow {
    fn name(&self) -> &str {
        &self.name
    }

    fn processor_path(&self, processor: ProcessorId) -> Option<String> {
        self.paths.read().get(&processor).cloned()
    }

    fn processing_strategy(&self) -> Arc<dyn ProcessingStrategy> {
        Arc::clone(&self.strategy)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .field("chain", &self.chain)
            .field("error_handler", &self.error_handler)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn register_paths(paths: &mut HashMap<ProcessorId, String>, prefix: &str, components: &[Component]) {
    for (index, component) in components.iter().enumerate() {
        let path = format!("{prefix}/{index}");
        register_paths(paths, &path, &component.children());
        paths.entry(component.id()).or_insert(path);
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Flow`].
pub struct FlowBuilder {
    name: String,
    strategy: Arc<dyn ProcessingStrategy>,
    runtime: Option<Arc<RuntimeContext>>,
    elements: Vec<Element>,
    error_handler: Option<ErrorHandler>,
}

impl FlowBuilder {
    /// Creates a builder with the synchronous strategy and a default runtime.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategy: Arc::new(SynchronousStrategy),
            runtime: None,
            elements: Vec::new(),
            error_handler: None,
        }
    }

    /// Sets the processing strategy.
    pub fn strategy(mut self, strategy: Arc<dyn ProcessingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the runtime.
    pub fn runtime(mut self, runtime: Arc<RuntimeContext>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the handler that failures of the chain are passed to.
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Appends an element.
    pub fn chain(mut self, element: impl Into<Element>) -> Self {
        self.elements.push(element.into());
        self
    }

    /// Appends a plain processor.
    pub fn processor<P: Processor>(self, processor: P) -> Self {
        self.chain(Element::processor(processor))
    }

    /// Appends an intercepting processor.
    pub fn interceptor<I: Interceptor>(self, interceptor: I) -> Self {
        self.chain(Element::interceptor(interceptor))
    }

    /// Appends a request/response interceptor.
    pub fn request_response<P: RequestResponse>(self, processor: P) -> Self {
        self.chain(Element::request_response(processor))
    }

    /// Lets the strategy shape the chain, builds it, and registers paths.
    pub fn build(self) -> Result<Arc<Flow>, ConfigurationError> {
        let runtime = self.runtime.unwrap_or_default();
        let mut builder = ChainBuilder::named(self.name.as_str());
        self.strategy.configure(
            self.elements,
            &StageNames::new(&self.name),
            &mut builder,
            &runtime,
        )?;
        let chain = builder.build()?;

        let mut paths = HashMap::new();
        let steps: Vec<Component> = chain.steps().cloned().collect();
        register_paths(&mut paths, &format!("/{}/processors", self.name), &steps);
        let handlers = self
            .error_handler
            .as_ref()
            .map(ErrorHandler::components)
            .unwrap_or_default();
        register_paths(&mut paths, &format!("/{}/errorHandler", self.name), &handlers);
        debug!(flow = %self.name, processors = paths.len(), "built");

        Ok(Arc::new_cyclic(|this| Flow {
            name: self.name,
            chain,
            strategy: self.strategy,
            runtime,
            error_handler: self.error_handler,
            handlers: LifecycleCoordinator::new(handlers),
            paths: RwLock::new(paths),
            stopped: AtomicBool::new(true),
            this: this.clone(),
        }))
    }

    /// Builds, initialises and starts the flow.
    pub fn start(self) -> Result<Arc<Flow>, SluiceError> {
        let flow = self.build()?;
        flow.initialise()?;
        flow.start()?;
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handler::OnErrorStrategy;
    use crate::testing::{Appending, AppendingInterceptor, Failing};
    use sluice_core::{LifecyclePhase, ReplyHandler};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Replies(Mutex<Vec<String>>);

    impl ReplyHandler for Replies {
        fn on_reply(&self, outcome: &Outcome) {
            self.0.lock().push(outcome.kind().to_string());
        }
    }

    #[test]
    fn registers_a_path_for_every_reachable_processor() {
        let nested = ChainBuilder::new().processor(Appending::new("a")).processor(Appending::new("b"));
        let flow = Flow::builder("orders")
            .processor(Appending::new("1"))
            .chain(nested)
            .build()
            .unwrap();

        let paths: Vec<String> = flow.paths().into_iter().map(|(_, path)| path).collect();
        assert_eq!(
            paths,
            [
                "/orders/processors/0",
                "/orders/processors/1",
                "/orders/processors/1/0",
                "/orders/processors/1/1",
            ]
        );
    }

    #[tokio::test]
    async fn stopped_flows_refuse_events() {
        let flow = Flow::builder("f").processor(Appending::new("1")).build().unwrap();
        assert!(flow.process(flow.event("0")).await.is_empty());

        flow.initialise().unwrap();
        flow.start().unwrap();
        let outcome = flow.process(flow.event("0")).await;
        assert_eq!(outcome.as_event().unwrap().payload_text(), "01");

        flow.stop().unwrap();
        assert!(flow.process(flow.event("0")).await.is_empty());
    }

    #[tokio::test]
    async fn replies_go_to_request_response_events_only() {
        let flow = Flow::builder("f")
            .request_response(AppendingInterceptor::new("1"))
            .build()
            .unwrap();
        flow.initialise().unwrap();
        flow.start().unwrap();
        let replies = Arc::new(Replies::default());

        let event = Event::builder("0").reply_to(replies.clone()).build();
        flow.process(event).await;
        let one_way = Event::builder("0")
            .exchange_pattern(sluice_core::ExchangePattern::OneWay)
            .reply_to(replies.clone())
            .build();
        flow.process(one_way).await;

        assert_eq!(*replies.0.lock(), ["value"]);
    }

    #[test]
    fn error_handler_chains_get_paths() {
        let handler = ErrorHandler::new()
            .on_error(OnErrorStrategy::any(Chain::from_single(Appending::new("h"))));
        let flow = Flow::builder("orders")
            .processor(Appending::new("1"))
            .error_handler(handler)
            .build()
            .unwrap();

        let paths: Vec<String> = flow.paths().into_iter().map(|(_, path)| path).collect();
        assert_eq!(
            paths,
            [
                "/orders/errorHandler/0",
                "/orders/errorHandler/0/0",
                "/orders/processors/0",
            ]
        );
    }

    #[test]
    fn failed_start_surfaces_as_sluice_error() {
        let handler_log = Appending::new("h");
        handler_log.lifecycle_log().fail_on(LifecyclePhase::Start);
        let handler = ErrorHandler::new().on_error(OnErrorStrategy::any(Chain::from_single(handler_log)));

        let error = Flow::builder("f")
            .processor(Failing::new("boom"))
            .error_handler(handler)
            .start()
            .unwrap_err();

        assert!(matches!(error, SluiceError::Lifecycle(LifecycleError::Failed { .. })));
    }
}
