//! # sluice-core
//!
//! Execution core for the Sluice processor-chain runtime.
//!
//! This crate holds the contracts and the chain engine. Concrete processing
//! strategies, flows and adapters live in `sluice-std`.
//!
//! # Building Blocks
//!
//! ## Processors ([`Processor`])
//!
//! A unit of work: receives an [`Event`], produces an [`Outcome`]. Processors
//! know nothing about what runs before or after them.
//!
//! ## Interceptors ([`Interceptor`])
//!
//! A processor that also receives a [`Next`] continuation: everything
//! positioned after it in the same chain. It decides whether, when and with
//! which event the rest of the chain runs. Most interceptors are written as
//! a request phase plus a response phase through [`RequestResponse`].
//!
//! ## Chains ([`Chain`], [`ChainBuilder`])
//!
//! An ordered, immutable composition of processors. Chains are processors
//! themselves and nest freely; a short-circuit inside a nested chain stays
//! private to it.
//!
//! ## Lifecycle ([`Lifecycle`], [`LifecycleCoordinator`])
//!
//! Context injection, `initialise`, `start`, `stop` and `dispose` cascade
//! through a chain and every nested component, exactly once per instance.
//!
//! # Outcomes
//!
//! Every step produces one of four results:
//!
//! - [`Outcome::Value`] - a (possibly replaced) event for the next step
//! - [`Outcome::Empty`] - an explicit "no result", ends the enclosing chain
//! - [`Outcome::Void`] - transparent, the previous event carries on
//! - [`Outcome::Failure`] - a [`ProcessingError`] naming the failing processor

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod chain;
mod component;
mod config;
mod context;
mod error;
mod event;
mod execution;
mod interceptor;
mod lifecycle;
mod notification;
mod outcome;
mod phase;
mod processor;
mod strategy;

// Re-exports
pub use chain::{Chain, ChainBuilder, Element, ProcessorBuilder};
pub use component::{Capabilities, Component, InterceptorRef, ProcessorId, ProcessorInfo, ProcessorRef};
pub use config::{DEFAULT_MAX_WORKERS, RuntimeConfig};
pub use context::{ActiveEvent, Context, FlowConstruct, RuntimeContext};
pub use error::{
    BoxError, ConfigurationError, LifecycleError, PanicError, ProcessingError, SluiceError,
    TimeoutError,
};
pub use event::{Event, EventBuilder, EventId, ExchangePattern, ReplyHandler, Session, Variables};
pub use execution::ExecutionInterceptor;
pub use interceptor::{Continuation, DynInterceptor, Interceptor, Next};
pub use lifecycle::{Lifecycle, LifecycleCoordinator, LifecyclePhase, LifecycleState};
pub use notification::{
    NotificationListener, NotificationManager, NotificationPhase, ProcessorNotification,
};
pub use outcome::Outcome;
pub use phase::{RequestPhase, RequestResponse, RequestResponseProcessor};
pub use processor::{DynProcessor, Processor};
pub use strategy::{
    Dispatch, NameSource, ProcessingStrategy, StepDescriptor, StepFuture, SynchronousStrategy,
};
