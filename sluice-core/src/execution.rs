//! The wrapper every step runs through.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::trace;

use crate::{
    chain::plan::Node,
    component::Component,
    context::Context,
    error::{PanicError, ProcessingError},
    event::Event,
    interceptor::Next,
    notification::{NotificationPhase, ProcessorNotification},
    outcome::Outcome,
    strategy::{Dispatch, StepFuture},
};

/// Invokes one step with notifications and error wrapping.
///
/// - fires a `Pre` notification when the event and runtime allow it and
///   the processor has a path in the current flow
/// - records the event as active
/// - turns a returned error or a panic into [`Outcome::Failure`], naming
///   this processor and the exact event it was handed
/// - fires a `Post` notification carrying the result or the failure
///
/// Failures that arrive already typed (from a nested step) are passed on
/// unchanged, so they keep naming the processor that actually failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionInterceptor;

impl ExecutionInterceptor {
    /// Runs `component` on `event`.
    pub async fn invoke(component: &Component, event: Event, next: Next, cx: &Context) -> Outcome {
        let info = component.info();
        let path = if cx.notifications_enabled(&event) {
            cx.processor_path(info.id())
        } else {
            None
        };

        if let Some(path) = &path {
            notify(cx, NotificationPhase::Pre, &event, component, path, None);
        }

        cx.bind_active(&event);
        trace!(processor = %info, event = %event.id(), "invoking");

        let input = event.clone();
        let outcome = match AssertUnwindSafe(component.call(event, next, cx))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(cause)) => Outcome::failure(ProcessingError::new(cause, info.clone(), input.clone())),
            Err(panic) => Outcome::failure(ProcessingError::new(
                Box::new(PanicError::from_payload(panic)),
                info.clone(),
                input.clone(),
            )),
        };

        if let Some(path) = &path {
            let (event, error) = match &outcome {
                Outcome::Value(event) => (event, None),
                Outcome::Failure(failure) => (failure.event(), Some(&**failure)),
                Outcome::Empty | Outcome::Void => (&input, None),
            };
            notify(cx, NotificationPhase::Post, event, component, path, error);
        }

        outcome
    }
}

fn notify(
    cx: &Context,
    phase: NotificationPhase,
    event: &Event,
    component: &Component,
    path: &str,
    error: Option<&ProcessingError>,
) {
    cx.runtime().notifications().fire(&ProcessorNotification {
        flow: cx.flow().map(|flow| flow.name()),
        event,
        processor: component.info(),
        path,
        error,
        phase,
    });
}

/// Runs a chain node, inline or through the strategy's worker dispatch.
pub(crate) async fn execute_step(node: &Node, event: Event, next: Next, cx: &Context) -> Outcome {
    let strategy = cx.strategy();
    match strategy.dispatch(&node.descriptor, &event) {
        Dispatch::Inline => ExecutionInterceptor::invoke(&node.component, event, next, cx).await,
        Dispatch::Worker => {
            cx.bind_active(&event);
            let submitted = event.clone();
            let component = node.component.clone();
            let worker_cx = cx.clone();
            let task: StepFuture = Box::pin(async move {
                ExecutionInterceptor::invoke(&component, event, next, &worker_cx).await
            });
            strategy.submit(&node.descriptor, &submitted, task, cx).await
        }
    }
}
