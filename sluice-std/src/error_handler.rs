//! Flow-level error handling.
//!
//! An [`ErrorHandler`] is an ordered list of [`OnErrorStrategy`] entries.
//! When a flow's chain fails, the first strategy that accepts the failure
//! routes the failed event through its own chain:
//!
//! - a *continuing* strategy (the default) answers with whatever its chain
//!   produced, so the caller sees a handled result
//! - a *propagating* strategy runs its chain for side effects and then
//!   hands the original failure on
//!
//! While routed, the event carries the failure's message in the
//! [`ERROR_VARIABLE`] variable. Handled results have it removed again.
//!
//! # Example
//!
//! ```rust,ignore
//! let handler = ErrorHandler::new()
//!     .on_error(OnErrorStrategy::of::<TimeoutError>(retry_later).propagating())
//!     .on_error(OnErrorStrategy::any(fallback));
//!
//! let flow = Flow::builder("orders").error_handler(handler)./* ... */build()?;
//! ```

use sluice_core::{Chain, Component, Context, Outcome, ProcessingError, ProcessorRef};
use std::{error::Error as StdError, fmt, sync::Arc};
use tracing::{debug, warn};

/// Variable holding the failure message while an event is being handled.
pub const ERROR_VARIABLE: &str = "error";

type Matcher = Arc<dyn Fn(&ProcessingError) -> bool + Send + Sync>;

// ============================================================================
// On-error strategy
// ============================================================================

/// One entry of an [`ErrorHandler`].
#[derive(Clone)]
pub struct OnErrorStrategy {
    matcher: Option<Matcher>,
    chain: Chain,
    component: Component,
    propagate: bool,
}

impl OnErrorStrategy {
    /// Handles every failure with `chain`.
    pub fn any(chain: Chain) -> Self {
        Self::build(None, chain)
    }

    /// Handles failures whose cause is an `E`.
    pub fn of<E: StdError + 'static>(chain: Chain) -> Self {
        Self::when(|failure: &ProcessingError| failure.is::<E>(), chain)
    }

    /// Handles failures accepted by `condition`.
    pub fn when<C>(condition: C, chain: Chain) -> Self
    where
        C: Fn(&ProcessingError) -> bool + Send + Sync + 'static,
    {
        Self::build(Some(Arc::new(condition)), chain)
    }

    fn build(matcher: Option<Matcher>, chain: Chain) -> Self {
        let component = Component::from(ProcessorRef::new(chain.clone()));
        Self {
            matcher,
            chain,
            component,
            propagate: false,
        }
    }

    /// Passes the original failure on after the chain ran.
    pub fn propagating(mut self) -> Self {
        self.propagate = true;
        self
    }

    /// Returns `true` if this strategy takes every failure.
    pub fn accepts_all(&self) -> bool {
        self.matcher.is_none()
    }

    /// Returns `true` if this strategy takes `failure`.
    pub fn accepts(&self, failure: &ProcessingError) -> bool {
        self.matcher.as_ref().is_none_or(|matcher| matcher(failure))
    }

    /// The strategy's chain as a lifecycle-managed component.
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Routes the failed event through the strategy's chain.
    pub async fn handle(&self, failure: ProcessingError, cx: &Context) -> Outcome {
        let routed = failure
            .event()
            .with_variable(ERROR_VARIABLE, failure.cause().to_string());
        let outcome = self.chain.run(routed.clone(), cx).await;

        if self.propagate {
            return match outcome {
                failed @ Outcome::Failure(_) => failed,
                _ => Outcome::failure(failure),
            };
        }

        match outcome {
            Outcome::Value(event) => Outcome::Value(event.without_variable(ERROR_VARIABLE)),
            Outcome::Void => Outcome::Value(routed.without_variable(ERROR_VARIABLE)),
            other => other,
        }
    }
}

impl fmt::Debug for OnErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnErrorStrategy")
            .field("accepts_all", &self.accepts_all())
            .field("propagate", &self.propagate)
            .field("chain", &self.chain)
            .finish()
    }
}

// ============================================================================
// Error handler
// ============================================================================

/// Ordered on-error strategies. The first accepting one handles a failure.
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    strategies: Vec<OnErrorStrategy>,
}

impl ErrorHandler {
    /// An empty handler. It passes every failure on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy.
    pub fn on_error(mut self, strategy: OnErrorStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// The strategies, in order.
    pub fn strategies(&self) -> &[OnErrorStrategy] {
        &self.strategies
    }

    /// Every strategy's chain, for lifecycle and path registration.
    pub fn components(&self) -> Vec<Component> {
        self.strategies
            .iter()
            .map(|strategy| strategy.component().clone())
            .collect()
    }

    /// Handles `failure` with the first accepting strategy.
    ///
    /// Without one the failure is returned unchanged.
    pub async fn handle(&self, failure: ProcessingError, cx: &Context) -> Outcome {
        let Some((index, strategy)) = self
            .strategies
            .iter()
            .enumerate()
            .find(|(_, strategy)| strategy.accepts_all() || strategy.accepts(&failure))
        else {
            warn!(processor = %failure.processor(), error = %failure, "no on-error strategy accepted the failure");
            return Outcome::failure(failure);
        };

        debug!(strategy = index, processor = %failure.processor(), "handling failure");
        strategy.handle(failure, cx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Appending, Failing};
    use sluice_core::{ChainBuilder, Event, PanicError, TimeoutError};

    async fn failure_of(processor: Failing) -> ProcessingError {
        let chain = Chain::from_single(processor);
        match chain.run(Event::new("0"), &Context::detached()).await {
            Outcome::Failure(failure) => *failure,
            other => panic!("expected a failure, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn first_accepting_strategy_wins() {
        let skipped = Appending::new("t");
        let chosen = Appending::new("h");
        let handler = ErrorHandler::new()
            .on_error(OnErrorStrategy::of::<TimeoutError>(Chain::from_single(skipped.clone())))
            .on_error(OnErrorStrategy::any(Chain::from_single(chosen.clone())));

        let outcome = handler.handle(failure_of(Failing::new("boom")).await, &Context::detached()).await;

        let event = outcome.as_event().unwrap();
        assert_eq!(event.payload_text(), "0h");
        assert!(event.variable(ERROR_VARIABLE).is_none());
        assert!(!skipped.invoked());
        assert_eq!(
            chosen.invocations()[0].variable(ERROR_VARIABLE).and_then(|v| v.as_str()),
            Some("boom")
        );
    }

    #[tokio::test]
    async fn propagating_strategy_returns_original_failure() {
        let handler = ErrorHandler::new().on_error(
            OnErrorStrategy::when(
                |failure: &ProcessingError| failure.is::<PanicError>(),
                Chain::from_single(Appending::new("p")),
            )
            .propagating(),
        );

        let outcome = handler
            .handle(failure_of(Failing::panicking("kaboom")).await, &Context::detached())
            .await;

        assert!(outcome.as_failure().unwrap().is::<PanicError>());
    }

    #[tokio::test]
    async fn unaccepted_failures_pass_through() {
        let handler = ErrorHandler::new().on_error(OnErrorStrategy::of::<TimeoutError>(
            ChainBuilder::new().build().unwrap(),
        ));

        let outcome = handler.handle(failure_of(Failing::new("boom")).await, &Context::detached()).await;

        assert_eq!(outcome.as_failure().unwrap().cause().to_string(), "boom");
    }
}
