//! The plain processor contract.

use futures::future::BoxFuture;
use std::{borrow::Cow, future::Future};

use crate::{
    component::{Capabilities, Component},
    context::Context,
    error::BoxError,
    event::Event,
    lifecycle::Lifecycle,
    outcome::Outcome,
};

/// A unit of work.
///
/// A processor receives an event and produces an [`Outcome`]. It knows
/// nothing about what runs before or after it.
///
/// Returning `Err` is the usual way to fail: the chain wraps the error in a
/// [`ProcessingError`](crate::ProcessingError) naming this processor and the
/// event it was handed. Returning `Ok(Outcome::Failure(..))` passes a failure
/// through untouched.
///
/// # Example
///
/// ```rust,ignore
/// struct Shout;
///
/// impl Processor for Shout {
///     async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
///         let loud = event.payload_text().to_uppercase();
///         Ok(Outcome::Value(event.with_payload(loud)))
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a Processor",
    label = "this type does not implement `Processor`",
    note = "Processors must implement `process(&self, Event, &Context) -> Result<Outcome, BoxError>`."
)]
pub trait Processor: Send + Sync + 'static {
    /// Processes one event.
    fn process(
        &self,
        event: Event,
        cx: &Context,
    ) -> impl Future<Output = Result<Outcome, BoxError>> + Send;

    /// Display name used in errors, logs and notifications.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name::<Self>())
    }

    /// What a processing strategy may assume about this processor.
    fn capabilities(&self) -> Capabilities {
        Capabilities::BLOCKING
    }

    /// Lifecycle callbacks, if the processor has any.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    /// Processors nested inside this one, for lifecycle and path registration.
    fn components(&self) -> Vec<Component> {
        Vec::new()
    }
}

/// Object-safe mirror of [`Processor`].
///
/// Implemented for every [`Processor`]; not meant to be implemented by hand.
pub trait DynProcessor: Send + Sync + 'static {
    /// See [`Processor::process`].
    fn process_dyn<'a>(
        &'a self,
        event: Event,
        cx: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome, BoxError>>;

    /// See [`Processor::lifecycle`].
    fn lifecycle_dyn(&self) -> Option<&dyn Lifecycle>;

    /// See [`Processor::components`].
    fn components_dyn(&self) -> Vec<Component>;
}

impl<P: Processor> DynProcessor for P {
    fn process_dyn<'a>(
        &'a self,
        event: Event,
        cx: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome, BoxError>> {
        Box::pin(self.process(event, cx))
    }

    fn lifecycle_dyn(&self) -> Option<&dyn Lifecycle> {
        self.lifecycle()
    }

    fn components_dyn(&self) -> Vec<Component> {
        self.components()
    }
}

/// `a::b::Thing<c::D>` becomes `Thing`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
