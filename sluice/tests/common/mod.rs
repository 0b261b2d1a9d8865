#![allow(dead_code)]

use sluice::strategy::NonBlockingProcessingStrategy;
use sluice::testing::{Appending, AppendingInterceptor};
use sluice::{
    Element, Event, ExchangePattern, Flow, FlowBuilder, Outcome, ProcessingStrategy, RuntimeConfig,
    RuntimeContext, SynchronousStrategy,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sends log output to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Elements
// ============================================================================

pub fn appending(suffix: &str) -> Element {
    Element::processor(Appending::new(suffix))
}

pub fn intercepting(suffix: &str) -> Element {
    AppendingInterceptor::new(suffix).into()
}

pub fn stopping(suffix: &str) -> Element {
    AppendingInterceptor::stopping(suffix).into()
}

pub fn nested(elements: Vec<Element>) -> Element {
    sluice::ChainBuilder::new().chain_all(elements).into()
}

// ============================================================================
// Flows
// ============================================================================

/// Builds, initialises and starts a flow.
pub fn started(builder: FlowBuilder) -> Arc<Flow> {
    init_tracing();
    let flow = builder.build().expect("flow should build");
    flow.initialise().expect("flow should initialise");
    flow.start().expect("flow should start");
    flow
}

/// A runtime with notifications switched on.
pub fn runtime() -> Arc<RuntimeContext> {
    Arc::new(RuntimeContext::new(RuntimeConfig::default()))
}

/// The payload of a value outcome.
pub fn payload(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Value(event) => event.payload_text().into_owned(),
        other => panic!("expected a value, got {}", other.kind()),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// One combination of exchange pattern, strategy and synchronicity.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub pattern: ExchangePattern,
    pub non_blocking: bool,
    pub synchronous: bool,
}

impl Scenario {
    pub fn new(pattern: ExchangePattern, non_blocking: bool, synchronous: bool) -> Self {
        Self {
            pattern,
            non_blocking,
            synchronous,
        }
    }

    pub fn strategy(&self) -> Arc<dyn ProcessingStrategy> {
        if self.non_blocking {
            Arc::new(NonBlockingProcessingStrategy::new())
        } else {
            Arc::new(SynchronousStrategy)
        }
    }

    pub fn event(&self, payload: &str) -> Event {
        Event::builder(payload)
            .exchange_pattern(self.pattern)
            .synchronous(self.synchronous)
            .allow_non_blocking(self.non_blocking && !self.synchronous)
            .build()
    }

    /// Runs `"0"` through a started flow made of `elements`.
    pub async fn run(&self, elements: Vec<Element>) -> Outcome {
        let builder = elements
            .into_iter()
            .fold(Flow::builder("scenario").strategy(self.strategy()), |builder, element| {
                builder.chain(element)
            });
        let flow = started(builder);
        flow.process(self.event("0")).await
    }
}
