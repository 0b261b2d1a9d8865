//! Interceptors split into a request phase and a response phase.
//!
//! [`RequestResponse`] covers the common "do something before, do something
//! after" shape. [`RequestResponseProcessor`] turns one into an
//! [`Interceptor`] and owns the rules for what reaches the response phase:
//!
//! | `next` produced | response phase receives          |
//! |-----------------|----------------------------------|
//! | a value         | that value                       |
//! | void            | a copy of the event given to `next` |
//! | empty           | skipped, the result is empty     |
//! | a failure       | skipped, unless `recover` says otherwise |
//!
//! `process_finally` runs exactly once per invocation, whatever happened.

use std::{borrow::Cow, error::Error as StdError, future::Future};
use tracing::{debug, trace};

use crate::{
    component::{Capabilities, Component},
    context::Context,
    error::{BoxError, ProcessingError},
    event::Event,
    interceptor::{Interceptor, Next},
    lifecycle::Lifecycle,
    outcome::Outcome,
    processor::short_type_name,
};

/// What the request phase decided.
#[derive(Debug)]
pub enum RequestPhase {
    /// Run the rest of the chain with this event.
    Proceed(Event),
    /// Skip the rest of the chain and the response phase; answer with this event.
    Respond(Event),
}

/// An interceptor expressed as two phases around the rest of the chain.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a RequestResponse processor",
    label = "this type does not implement `RequestResponse`"
)]
pub trait RequestResponse: Send + Sync + 'static {
    /// Runs before the rest of the chain. Defaults to proceeding unchanged.
    fn process_request(
        &self,
        event: Event,
        _cx: &Context,
    ) -> impl Future<Output = Result<RequestPhase, BoxError>> + Send {
        async move { Ok(RequestPhase::Proceed(event)) }
    }

    /// Runs after the rest of the chain produced `response`.
    ///
    /// `request` is the event this processor originally received.
    fn process_response(
        &self,
        response: Event,
        _request: &Event,
        _cx: &Context,
    ) -> impl Future<Output = Result<Outcome, BoxError>> + Send {
        async move { Ok(Outcome::Value(response)) }
    }

    /// Decides whether a failure from the rest of the chain is absorbed.
    ///
    /// When it returns `true`, the response phase runs with a copy of the
    /// original request.
    fn recover(&self, _failure: &ProcessingError, _request: &Event) -> bool {
        false
    }

    /// Runs once at the end of every invocation.
    fn process_finally(&self, _event: &Event, _failure: Option<&(dyn StdError + 'static)>) {}

    /// Display name used in errors, logs and notifications.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name::<Self>())
    }

    /// What a processing strategy may assume about this processor.
    fn capabilities(&self) -> Capabilities {
        Capabilities::BLOCKING
    }

    /// Lifecycle callbacks, if any.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    /// Processors nested inside this one.
    fn components(&self) -> Vec<Component> {
        Vec::new()
    }
}

/// Adapts a [`RequestResponse`] into an [`Interceptor`].
#[derive(Debug, Clone)]
pub struct RequestResponseProcessor<P> {
    inner: P,
}

impl<P> RequestResponseProcessor<P> {
    /// Wraps `inner`.
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    /// The wrapped processor.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: RequestResponse> Interceptor for RequestResponseProcessor<P> {
    async fn intercept(&self, event: Event, next: Next, cx: &Context) -> Result<Outcome, BoxError> {
        let request = event.clone();

        let forwarded = match self.inner.process_request(event, cx).await {
            Ok(RequestPhase::Proceed(forwarded)) => forwarded,
            Ok(RequestPhase::Respond(response)) => {
                debug!(processor = %self.inner.name(), "request phase answered, skipping rest of chain");
                self.inner.process_finally(&response, None);
                return Ok(Outcome::Value(response));
            }
            Err(err) => {
                self.inner.process_finally(&request, Some(err.as_ref()));
                return Err(err);
            }
        };

        let response = match next.run(forwarded.clone(), cx).await {
            Outcome::Value(response) => response,
            Outcome::Void => forwarded.copy(),
            Outcome::Empty => {
                trace!(processor = %self.inner.name(), "rest of chain was empty, skipping response phase");
                self.inner.process_finally(&forwarded, None);
                return Ok(Outcome::Empty);
            }
            Outcome::Failure(failure) => {
                if self.inner.recover(&failure, &request) {
                    debug!(processor = %self.inner.name(), error = %failure, "recovered from failure");
                    request.copy()
                } else {
                    self.inner.process_finally(&request, Some(&*failure));
                    return Ok(Outcome::Failure(failure));
                }
            }
        };

        let result = self.inner.process_response(response, &request, cx).await;
        match &result {
            Ok(Outcome::Value(event)) => self.inner.process_finally(event, None),
            Ok(Outcome::Failure(failure)) => {
                self.inner.process_finally(failure.event(), Some(&**failure))
            }
            Ok(_) => self.inner.process_finally(&request, None),
            Err(err) => self.inner.process_finally(&request, Some(err.as_ref())),
        }
        result
    }

    fn name(&self) -> Cow<'static, str> {
        self.inner.name()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        self.inner.lifecycle()
    }

    fn components(&self) -> Vec<Component> {
        self.inner.components()
    }
}
