//! Timeout wrapper for time-limited processing.

use sluice_core::{BoxError, Capabilities, Component, Context, Event, Lifecycle, Outcome, Processor, TimeoutError};
use std::{borrow::Cow, time::Duration};
use tokio::time::timeout;

/// A processor that fails if the wrapped one takes longer than `duration`.
#[derive(Debug, Clone)]
pub struct Timeout<P> {
    inner: P,
    duration: Duration,
}

impl<P> Timeout<P> {
    /// Create a new timeout wrapper.
    pub fn new(inner: P, duration: Duration) -> Self {
        Self { inner, duration }
    }
}

impl<P: Processor> Processor for Timeout<P> {
    async fn process(&self, event: Event, cx: &Context) -> Result<Outcome, BoxError> {
        match timeout(self.duration, self.inner.process(event, cx)).await {
            Ok(result) => result,
            Err(_) => Err(Box::new(TimeoutError(self.duration))),
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy(Duration);

    impl Processor for Sleepy {
        async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
            tokio::time::sleep(self.0).await;
            Ok(Outcome::Value(event))
        }
    }

    #[tokio::test]
    async fn slow_processors_time_out() {
        let processor = Timeout::new(Sleepy(Duration::from_secs(5)), Duration::from_millis(10));

        let err = processor.process(Event::new("x"), &Context::detached()).await.unwrap_err();

        assert!(err.is::<TimeoutError>());
    }

    #[tokio::test]
    async fn fast_processors_pass_through() {
        let processor = Timeout::new(Sleepy(Duration::ZERO), Duration::from_secs(1));

        let outcome = processor.process(Event::new("x"), &Context::detached()).await.unwrap();

        assert!(outcome.is_value());
    }
}
