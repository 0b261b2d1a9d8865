use std::fmt;

use crate::{
    chain::{Chain, plan::Plan},
    component::{Component, InterceptorRef, ProcessorRef},
    error::{BoxError, ConfigurationError},
    interceptor::Interceptor,
    phase::{RequestResponse, RequestResponseProcessor},
    processor::Processor,
};

/// Produces a chain element when the chain is built.
///
/// Useful for components that can only be assembled once their
/// surroundings are known, and for nesting a [`ChainBuilder`] without
/// building it first.
pub trait ProcessorBuilder: Send + Sync {
    /// Materializes the element.
    fn build(self: Box<Self>) -> Result<Element, BoxError>;
}

/// Anything that can be placed into a chain.
pub enum Element {
    /// A plain processor.
    Processor(ProcessorRef),
    /// An intercepting processor.
    Interceptor(InterceptorRef),
    /// Resolved when the enclosing chain is built.
    Builder(Box<dyn ProcessorBuilder>),
}

impl Element {
    /// A plain processor.
    pub fn processor<P: Processor>(processor: P) -> Self {
        Self::Processor(ProcessorRef::new(processor))
    }

    /// An intercepting processor.
    pub fn interceptor<I: Interceptor>(interceptor: I) -> Self {
        Self::Interceptor(InterceptorRef::new(interceptor))
    }

    /// An interceptor written as request and response phases.
    pub fn request_response<P: RequestResponse>(processor: P) -> Self {
        Self::interceptor(RequestResponseProcessor::new(processor))
    }

    /// A deferred element.
    pub fn builder<B: ProcessorBuilder + 'static>(builder: B) -> Self {
        Self::Builder(Box::new(builder))
    }

    fn resolve(self, position: usize) -> Result<Component, ConfigurationError> {
        let mut element = self;
        loop {
            element = match element {
                Self::Processor(processor) => return Ok(Component::Processor(processor)),
                Self::Interceptor(interceptor) => return Ok(Component::Interceptor(interceptor)),
                Self::Builder(builder) => {
                    builder
                        .build()
                        .map_err(|err| ConfigurationError::Unresolvable {
                            position,
                            reason: err.to_string(),
                        })?
                }
            };
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processor(p) => f.debug_tuple("Processor").field(p).finish(),
            Self::Interceptor(i) => f.debug_tuple("Interceptor").field(i).finish(),
            Self::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

impl From<ProcessorRef> for Element {
    fn from(processor: ProcessorRef) -> Self {
        Self::Processor(processor)
    }
}

impl From<InterceptorRef> for Element {
    fn from(interceptor: InterceptorRef) -> Self {
        Self::Interceptor(interceptor)
    }
}

impl From<Component> for Element {
    fn from(component: Component) -> Self {
        match component {
            Component::Processor(p) => Self::Processor(p),
            Component::Interceptor(i) => Self::Interceptor(i),
        }
    }
}

impl From<Chain> for Element {
    fn from(chain: Chain) -> Self {
        Self::processor(chain)
    }
}

impl From<ChainBuilder> for Element {
    fn from(builder: ChainBuilder) -> Self {
        Self::builder(builder)
    }
}

/// Assembles a [`Chain`].
///
/// # Example
///
/// ```rust,ignore
/// let chain = ChainBuilder::new()
///     .processor(Validate)
///     .request_response(Audit::default())
///     .chain(ChainBuilder::new().processor(Enrich).processor(Store))
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct ChainBuilder {
    name: Option<String>,
    elements: Vec<Element>,
}

impl ChainBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty builder for a named chain.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            elements: Vec::new(),
        }
    }

    /// Appends an element.
    pub fn chain(mut self, element: impl Into<Element>) -> Self {
        self.elements.push(element.into());
        self
    }

    /// Appends elements in order.
    pub fn chain_all<E: Into<Element>>(mut self, elements: impl IntoIterator<Item = E>) -> Self {
        self.extend(elements);
        self
    }

    /// Appends a plain processor.
    pub fn processor<P: Processor>(self, processor: P) -> Self {
        self.chain(Element::processor(processor))
    }

    /// Appends an intercepting processor.
    pub fn interceptor<I: Interceptor>(self, interceptor: I) -> Self {
        self.chain(Element::interceptor(interceptor))
    }

    /// Appends a request/response interceptor.
    pub fn request_response<P: RequestResponse>(self, processor: P) -> Self {
        self.chain(Element::request_response(processor))
    }

    /// Appends an element in place.
    pub fn push(&mut self, element: impl Into<Element>) {
        self.elements.push(element.into());
    }

    /// Appends elements in place.
    pub fn extend<E: Into<Element>>(&mut self, elements: impl IntoIterator<Item = E>) {
        self.elements.extend(elements.into_iter().map(Into::into));
    }

    /// Number of elements added so far.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Resolves every element and compiles the chain.
    ///
    /// Fails on the first element that cannot be resolved.
    pub fn build(self) -> Result<Chain, ConfigurationError> {
        let components = self
            .elements
            .into_iter()
            .enumerate()
            .map(|(position, element)| element.resolve(position))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Chain::from_plan(Plan::compile(self.name, components)))
    }
}

impl ProcessorBuilder for ChainBuilder {
    fn build(self: Box<Self>) -> Result<Element, BoxError> {
        Ok(Element::from(ChainBuilder::build(*self)?))
    }
}
