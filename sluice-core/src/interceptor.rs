//! Intercepting processors and their continuation.

use futures::future::BoxFuture;
use std::{borrow::Cow, fmt, future::Future, sync::Arc};

use crate::{
    component::{Capabilities, Component},
    context::Context,
    error::BoxError,
    event::Event,
    lifecycle::Lifecycle,
    outcome::Outcome,
    processor::short_type_name,
};

/// A processor that wraps the rest of its chain.
///
/// `next` runs everything positioned after this interceptor in the same
/// chain. Not calling it short-circuits those steps, but only those: a
/// chain enclosing this one carries on as usual.
///
/// Most interceptors are easier to write as a [`RequestResponse`](crate::RequestResponse).
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an Interceptor",
    label = "this type does not implement `Interceptor`",
    note = "Interceptors must implement `intercept(&self, Event, Next, &Context)`."
)]
pub trait Interceptor: Send + Sync + 'static {
    /// Handles one event, optionally running the rest of the chain.
    fn intercept(
        &self,
        event: Event,
        next: Next,
        cx: &Context,
    ) -> impl Future<Output = Result<Outcome, BoxError>> + Send;

    /// Display name used in errors, logs and notifications.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name::<Self>())
    }

    /// What a processing strategy may assume about this interceptor.
    ///
    /// [`Capabilities::INTERCEPTING`] is always added.
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

/// Object-safe mirror of [`Interceptor`].
pub trait DynInterceptor: Send + Sync + 'static {
    /// See [`Interceptor::intercept`].
    fn intercept_dyn<'a>(
        &'a self,
        event: Event,
        next: Next,
        cx: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome, BoxError>>;

    /// See [`Interceptor::lifecycle`].
    fn lifecycle_dyn(&self) -> Option<&dyn Lifecycle>;

    /// See [`Interceptor::components`].
    fn components_dyn(&self) -> Vec<Component>;
}

impl<I: Interceptor> DynInterceptor for I {
    fn intercept_dyn<'a>(
        &'a self,
        event: Event,
        next: Next,
        cx: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome, BoxError>> {
        Box::pin(self.intercept(event, next, cx))
    }

    fn lifecycle_dyn(&self) -> Option<&dyn Lifecycle> {
        self.lifecycle()
    }

    fn components_dyn(&self) -> Vec<Component> {
        self.components()
    }
}

// ============================================================================
// Continuation
// ============================================================================

/// The remainder of a chain, as seen by an interceptor.
pub trait Continuation: Send + Sync + 'static {
    /// Runs the remaining steps. Never returns [`Outcome::Void`].
    fn proceed<'a>(&'a self, event: Event, cx: &'a Context) -> BoxFuture<'a, Outcome>;
}

/// Handle to the steps after an interceptor.
///
/// Cheap to clone and `'static`, so an interceptor may move it into a
/// spawned task. An interceptor at the end of its chain gets a terminal
/// `Next` that hands the event straight back.
#[derive(Clone, Default)]
pub struct Next {
    continuation: Option<Arc<dyn Continuation>>,
}

impl Next {
    /// Wraps a continuation.
    pub fn new(continuation: Arc<dyn Continuation>) -> Self {
        Self {
            continuation: Some(continuation),
        }
    }

    /// A continuation with nothing left to run.
    pub fn terminal() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing follows.
    pub fn is_terminal(&self) -> bool {
        self.continuation.is_none()
    }

    /// Runs the rest of the chain.
    pub async fn run(&self, event: Event, cx: &Context) -> Outcome {
        match &self.continuation {
            Some(continuation) => continuation.proceed(event, cx).await,
            None => Outcome::Value(event),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("terminal", &self.is_terminal())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminal_next_returns_the_same_event() {
        let event = Event::new("x");
        let outcome = Next::terminal().run(event.clone(), &Context::detached()).await;

        assert!(Event::ptr_eq(outcome.as_event().unwrap(), &event));
    }

    struct Fixed;

    impl Continuation for Fixed {
        fn proceed<'a>(&'a self, event: Event, _cx: &'a Context) -> BoxFuture<'a, Outcome> {
            Box::pin(async move { Outcome::Value(event.with_payload("fixed")) })
        }
    }

    #[tokio::test]
    async fn next_delegates_to_its_continuation() {
        let next = Next::new(Arc::new(Fixed));
        assert!(!next.is_terminal());

        let outcome = next.run(Event::new("x"), &Context::detached()).await;
        assert_eq!(outcome.as_event().unwrap().payload_text(), "fixed");
    }
}
