//! Tower integration for sluice.
//!
//! This module provides adapters between sluice chains and tower's
//! `Service` trait:
//!
//! - [`ChainService`] exposes a built [`Chain`] as a `Service<Event>`
//! - [`ServiceProcessor`] uses a `Service<Event>` as a chain step
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice_std::tower::ChainService;
//!
//! let service = ChainService::new(chain, Context::detached());
//! let with_timeout = tower::timeout::Timeout::new(service, Duration::from_secs(5));
//! ```

use ::tower::Service;
use sluice_core::{BoxError, Chain, Context, Event, Outcome, ProcessingError, Processor};
use std::{
    future::Future,
    pin::Pin,
    task::{self, Poll},
};

// ============================================================================
// Chain -> Service Adapter
// ============================================================================

/// Wraps a [`Chain`] as a tower `Service`.
///
/// Responds with `Some(event)` for a value, `None` for an empty result,
/// and fails with the chain's [`ProcessingError`].
#[derive(Debug, Clone)]
pub struct ChainService {
    chain: Chain,
    cx: Context,
}

impl ChainService {
    /// Serves `chain`, running every request with `cx`.
    pub fn new(chain: Chain, cx: Context) -> Self {
        Self { chain, cx }
    }

    /// The wrapped chain.
    pub fn inner(&self) -> &Chain {
        &self.chain
    }
}

impl Service<Event> for ChainService {
    type Response = Option<Event>;
    type Error = ProcessingError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Chains are always ready
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Event) -> Self::Future {
        let chain = self.chain.clone();
        let cx = self.cx.clone();
        Box::pin(async move { chain.run(request, &cx).await.into_result() })
    }
}

// ============================================================================
// Service -> Processor Adapter
// ============================================================================

/// Wraps a tower `Service` as a plain [`Processor`].
///
/// `Some(event)` continues the chain with that event, `None` ends it with
/// an empty result.
#[derive(Debug, Clone)]
pub struct ServiceProcessor<S> {
    service: S,
}

impl<S> ServiceProcessor<S> {
    /// Create a new `ServiceProcessor` wrapping the given service.
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> Processor for ServiceProcessor<S>
where
    S: Service<Event, Response = Option<Event>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
        let mut service = self.service.clone();
        std::future::poll_fn(|cx| service.poll_ready(cx))
            .await
            .map_err(Into::<BoxError>::into)?;
        match service.call(event).await.map_err(Into::<BoxError>::into)? {
            Some(event) => Ok(Outcome::Value(event)),
            None => Ok(Outcome::Empty),
        }
    }
}
