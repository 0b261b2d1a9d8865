//! Running processors on the way back.

use sluice_core::{
    BoxError, Chain, Component, Context, Element, Event, Lifecycle, Outcome, Processor,
    RequestResponse,
};
use std::borrow::Cow;

/// Runs its wrapped processor during the response phase instead of the
/// request phase.
///
/// Placed in a chain, it lets the rest of the chain run first and then
/// applies the wrapped processor to the result:
///
/// ```rust,ignore
/// // "0" -> "0123"
/// ChainBuilder::new()
///     .processor(Appending::new("1"))
///     .chain(ResponseScopedAdapter::new(Appending::new("3")))
///     .processor(Appending::new("2"))
/// ```
///
/// If the wrapped processor produces nothing (empty or void), a copy of the
/// response it was given is returned. Failures propagate.
#[derive(Debug, Clone)]
pub struct ResponseScopedAdapter {
    inner: Chain,
}

impl ResponseScopedAdapter {
    /// Wraps a single processor.
    pub fn new<P: Processor>(processor: P) -> Self {
        Self::from_chain(Chain::from_single(processor))
    }

    /// Wraps a whole chain.
    pub fn from_chain(chain: Chain) -> Self {
        Self { inner: chain }
    }
}

impl RequestResponse for ResponseScopedAdapter {
    async fn process_response(&self, response: Event, _request: &Event, cx: &Context) -> Result<Outcome, BoxError> {
        let fallback = response.copy();
        Ok(match self.inner.run(response, cx).await {
            Outcome::Empty | Outcome::Void => Outcome::Value(fallback),
            other => other,
        })
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("response")
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&self.inner)
    }

    fn components(&self) -> Vec<Component> {
        self.inner.steps().cloned().collect()
    }
}

impl From<ResponseScopedAdapter> for Element {
    fn from(adapter: ResponseScopedAdapter) -> Self {
        Element::request_response(adapter)
    }
}
