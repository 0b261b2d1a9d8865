//! Shared handles to processors and interceptors.
//!
//! A chain never owns a processor by value. It holds a [`ProcessorRef`] or
//! an [`InterceptorRef`]: a reference-counted handle that pairs the user's
//! component with a stable [`ProcessorId`] and its lifecycle state. Cloning
//! a handle shares the instance, so a processor placed in two chains is
//! still initialised once.

use bitflags::bitflags;
use futures::future::BoxFuture;
use std::{
    borrow::Cow,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    error::{BoxError, LifecycleError},
    event::Event,
    context::{Context, FlowConstruct, RuntimeContext},
    interceptor::{DynInterceptor, Interceptor, Next},
    lifecycle::{Lifecycle, LifecycleGuard, LifecyclePhase, LifecycleState},
    outcome::Outcome,
    processor::{DynProcessor, Processor},
};

static NEXT_PROCESSOR_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a processor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(u64);

impl ProcessorId {
    fn next() -> Self {
        Self(NEXT_PROCESSOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity plus display name of a processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessorInfo {
    id: ProcessorId,
    name: Arc<str>,
}

impl ProcessorInfo {
    fn new(name: Cow<'static, str>) -> Self {
        Self {
            id: ProcessorId::next(),
            name: Arc::from(name.as_ref()),
        }
    }

    /// The processor's id.
    pub fn id(&self) -> ProcessorId {
        self.id
    }

    /// The processor's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ProcessorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

bitflags! {
    /// What a processing strategy may assume about a step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Receives the rest of the chain as a continuation.
        const INTERCEPTING = 1;
        /// May tie up its task; a candidate for worker dispatch.
        const BLOCKING = 1 << 1;
        /// Completes through a callback and never blocks its caller.
        const NON_BLOCKING = 1 << 2;
    }
}

// ============================================================================
// Handles
// ============================================================================

struct Managed<T: ?Sized> {
    info: ProcessorInfo,
    capabilities: Capabilities,
    guard: LifecycleGuard,
    inner: T,
}

/// Shared handle to a plain processor.
#[derive(Clone)]
pub struct ProcessorRef(Arc<Managed<dyn DynProcessor>>);

impl ProcessorRef {
    /// Takes ownership of a processor and assigns it an id.
    pub fn new<P: Processor>(processor: P) -> Self {
        let info = ProcessorInfo::new(processor.name());
        let capabilities = processor.capabilities() - Capabilities::INTERCEPTING;
        Self(Arc::new(Managed {
            info,
            capabilities,
            guard: LifecycleGuard::default(),
            inner: processor,
        }))
    }

    /// Identity and name.
    pub fn info(&self) -> &ProcessorInfo {
        &self.0.info
    }

    /// Declared capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.0.capabilities
    }

    /// Runs the processor directly, bypassing notifications and dispatch.
    pub fn process<'a>(
        &'a self,
        event: Event,
        cx: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome, BoxError>> {
        self.0.inner.process_dyn(event, cx)
    }

    /// Returns `true` if both handles share one instance.
    pub fn ptr_eq(a: &ProcessorRef, b: &ProcessorRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for ProcessorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProcessorRef").field(&self.0.info).finish()
    }
}

/// Shared handle to an intercepting processor.
#[derive(Clone)]
pub struct InterceptorRef(Arc<Managed<dyn DynInterceptor>>);

impl InterceptorRef {
    /// Takes ownership of an interceptor and assigns it an id.
    pub fn new<I: Interceptor>(interceptor: I) -> Self {
        let info = ProcessorInfo::new(interceptor.name());
        let capabilities = interceptor.capabilities() | Capabilities::INTERCEPTING;
        Self(Arc::new(Managed {
            info,
            capabilities,
            guard: LifecycleGuard::default(),
            inner: interceptor,
        }))
    }

    /// Identity and name.
    pub fn info(&self) -> &ProcessorInfo {
        &self.0.info
    }

    /// Declared capabilities, always including [`Capabilities::INTERCEPTING`].
    pub fn capabilities(&self) -> Capabilities {
        self.0.capabilities
    }

    /// Runs the interceptor directly, bypassing notifications and dispatch.
    pub fn intercept<'a>(
        &'a self,
        event: Event,
        next: Next,
        cx: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome, BoxError>> {
        self.0.inner.intercept_dyn(event, next, cx)
    }

    /// Returns `true` if both handles share one instance.
    pub fn ptr_eq(a: &InterceptorRef, b: &InterceptorRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for InterceptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterceptorRef").field(&self.0.info).finish()
    }
}

// ============================================================================
// Component
// ============================================================================

/// A resolved chain step: either kind of processor.
#[derive(Clone, Debug)]
pub enum Component {
    /// A plain processor.
    Processor(ProcessorRef),
    /// An intercepting processor.
    Interceptor(InterceptorRef),
}

impl Component {
    /// Identity and name.
    pub fn info(&self) -> &ProcessorInfo {
        match self {
            Self::Processor(p) => p.info(),
            Self::Interceptor(i) => i.info(),
        }
    }

    /// The component's id.
    pub fn id(&self) -> ProcessorId {
        self.info().id()
    }

    /// The component's name.
    pub fn name(&self) -> &str {
        self.info().name()
    }

    /// Declared capabilities.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::Processor(p) => p.capabilities(),
            Self::Interceptor(i) => i.capabilities(),
        }
    }

    /// Returns `true` for interceptors.
    pub fn is_intercepting(&self) -> bool {
        matches!(self, Self::Interceptor(_))
    }

    /// Current lifecycle state of the instance.
    pub fn state(&self) -> LifecycleState {
        self.guard().state()
    }

    /// Components nested inside this one, in order.
    pub fn children(&self) -> Vec<Component> {
        match self {
            Self::Processor(p) => p.0.inner.components_dyn(),
            Self::Interceptor(i) => i.0.inner.components_dyn(),
        }
    }

    /// Invokes the component. Plain processors ignore `next`.
    pub fn call<'a>(
        &'a self,
        event: Event,
        next: Next,
        cx: &'a Context,
    ) -> BoxFuture<'a, Result<Outcome, BoxError>> {
        match self {
            Self::Processor(p) => p.process(event, cx),
            Self::Interceptor(i) => i.intercept(event, next, cx),
        }
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        match self {
            Self::Processor(p) => p.0.inner.lifecycle_dyn(),
            Self::Interceptor(i) => i.0.inner.lifecycle_dyn(),
        }
    }

    fn guard(&self) -> &LifecycleGuard {
        match self {
            Self::Processor(p) => &p.0.guard,
            Self::Interceptor(i) => &i.0.guard,
        }
    }

    pub(crate) fn inject_context(&self, context: &Arc<RuntimeContext>) {
        if self.guard().mark_context() {
            if let Some(lifecycle) = self.lifecycle() {
                lifecycle.set_context(context);
            }
        }
    }

    pub(crate) fn inject_flow(&self, flow: &Arc<dyn FlowConstruct>) {
        if self.guard().mark_flow() {
            if let Some(lifecycle) = self.lifecycle() {
                lifecycle.set_flow(flow);
            }
        }
    }

    /// Moves the instance through `phase`. Returns `Ok(false)` if the
    /// instance had already been through it.
    pub(crate) fn transition(&self, phase: LifecyclePhase) -> Result<bool, LifecycleError> {
        let lifecycle = self.lifecycle();
        let composite = !self.children().is_empty();
        self.guard().transition(phase, self.name(), composite, || match lifecycle {
            Some(lifecycle) => phase.apply(lifecycle),
            None => Ok(()),
        })
    }
}

impl From<ProcessorRef> for Component {
    fn from(processor: ProcessorRef) -> Self {
        Self::Processor(processor)
    }
}

impl From<InterceptorRef> for Component {
    fn from(interceptor: InterceptorRef) -> Self {
        Self::Interceptor(interceptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Processor for Upper {
        async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
            let upper = event.payload_text().to_uppercase();
            Ok(Outcome::Value(event.with_payload(upper)))
        }
    }

    #[test]
    fn ids_are_unique_per_instance() {
        let a = ProcessorRef::new(Upper);
        let b = ProcessorRef::new(Upper);

        assert_ne!(a.info().id(), b.info().id());
        assert_eq!(a.info().id(), a.clone().info().id());
        assert!(ProcessorRef::ptr_eq(&a, &a.clone()));
        assert!(!ProcessorRef::ptr_eq(&a, &b));
    }

    #[test]
    fn default_name_is_the_type_name() {
        let p = ProcessorRef::new(Upper);
        assert_eq!(p.info().name(), "Upper");
    }

    #[test]
    fn plain_processors_never_claim_interception() {
        let component = Component::from(ProcessorRef::new(Upper));
        assert!(!component.capabilities().contains(Capabilities::INTERCEPTING));
        assert!(component.capabilities().contains(Capabilities::BLOCKING));
        assert!(!component.is_intercepting());
    }

    #[tokio::test]
    async fn call_runs_the_processor() {
        let component = Component::from(ProcessorRef::new(Upper));
        let cx = Context::detached();

        let outcome = component
            .call(Event::new("abc"), Next::terminal(), &cx)
            .await
            .unwrap();

        assert_eq!(outcome.as_event().unwrap().payload_text(), "ABC");
    }
}
