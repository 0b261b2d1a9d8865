//! Processors that complete through a callback.
//!
//! A [`NonBlockingProcessor`] is handed a [`Completion`] and returns
//! immediately; whoever holds the completion finishes the step later,
//! typically from another task. [`NonBlocking`] adapts one into a regular
//! [`Processor`] whose future suspends until the completion fires, so the
//! chain resumes with the remaining steps exactly once.

use futures::channel::oneshot;
use sluice_core::{BoxError, Capabilities, Context, Event, Lifecycle, Outcome, Processor};
use std::borrow::Cow;
use thiserror::Error;
use tracing::trace;

/// The completion handle was dropped without being completed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("non-blocking processor dropped its completion without completing")]
pub struct CompletionDropped;

/// Finishes a non-blocking step. Consumed on use, so it fires at most once.
#[derive(Debug)]
pub struct Completion {
    sender: oneshot::Sender<Result<Outcome, BoxError>>,
}

impl Completion {
    /// Completes with an outcome.
    pub fn complete(self, outcome: Outcome) {
        // the receiver is gone only if the chain was dropped
        let _ = self.sender.send(Ok(outcome));
    }

    /// Completes with an event.
    pub fn succeed(self, event: Event) {
        self.complete(Outcome::Value(event));
    }

    /// Completes with an error.
    pub fn fail(self, error: impl Into<BoxError>) {
        let _ = self.sender.send(Err(error.into()));
    }
}

/// A processor that reports its result through a [`Completion`].
pub trait NonBlockingProcessor: Send + Sync + 'static {
    /// Starts processing. Must not wait for the work to finish.
    ///
    /// Returning `Err` fails the step immediately and drops `completion`.
    fn process_non_blocking(&self, event: Event, completion: Completion, cx: &Context) -> Result<(), BoxError>;

    /// Display name used in errors, logs and notifications.
    fn name(&self) -> Cow<'static, str>;

    /// Lifecycle callbacks, if any.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }
}

/// Adapts a [`NonBlockingProcessor`] into a [`Processor`].
#[derive(Debug, Clone)]
pub struct NonBlocking<P> {
    inner: P,
}

impl<P> NonBlocking<P> {
    /// Wraps `inner`.
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    /// The wrapped processor.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: NonBlockingProcessor> Processor for NonBlocking<P> {
    async fn process(&self, event: Event, cx: &Context) -> Result<Outcome, BoxError> {
        let (sender, receiver) = oneshot::channel();
        cx.bind_active(&event);
        self.inner.process_non_blocking(event, Completion { sender }, cx)?;

        trace!(processor = %self.inner.name(), "suspended until completion");
        match receiver.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(Box::new(CompletionDropped)),
        }
    }

    fn name(&self) -> Cow<'static, str> {
        self.inner.name()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NON_BLOCKING
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        self.inner.lifecycle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Later;

    impl NonBlockingProcessor for Later {
        fn process_non_blocking(&self, event: Event, completion: Completion, _cx: &Context) -> Result<(), BoxError> {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                completion.succeed(event.with_payload("later"));
            });
            Ok(())
        }

        fn name(&self) -> Cow<'static, str> {
            "later".into()
        }
    }

    struct Forgetful;

    impl NonBlockingProcessor for Forgetful {
        fn process_non_blocking(&self, _event: Event, _completion: Completion, _cx: &Context) -> Result<(), BoxError> {
            Ok(())
        }

        fn name(&self) -> Cow<'static, str> {
            "forgetful".into()
        }
    }

    #[tokio::test]
    async fn resumes_when_completed_from_another_task() {
        let processor = NonBlocking::new(Later);

        let outcome = processor.process(Event::new("now"), &Context::detached()).await.unwrap();

        assert_eq!(outcome.as_event().unwrap().payload_text(), "later");
        assert_eq!(processor.capabilities(), Capabilities::NON_BLOCKING);
    }

    #[tokio::test]
    async fn dropped_completion_is_an_error() {
        let err = NonBlocking::new(Forgetful)
            .process(Event::new("x"), &Context::detached())
            .await
            .unwrap_err();

        assert!(err.is::<CompletionDropped>());
    }
}
