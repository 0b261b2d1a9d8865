//! # sluice - Composable Processor Chains
//!
//! `sluice` threads events through ordered chains of processors. Processors
//! can be plain (event in, event out) or intercepting (they wrap the rest of
//! the chain), chains nest inside each other, and every component gets a
//! managed lifecycle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sluice::prelude::*;
//!
//! struct Shout;
//!
//! impl Processor for Shout {
//!     async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
//!         let loud = event.payload_text().to_uppercase();
//!         Ok(Outcome::Value(event.with_payload(loud)))
//!     }
//! }
//!
//! // Builds, initialises and starts in one go.
//! let flow = Flow::builder("greetings").processor(Shout).start()?;
//!
//! let outcome = flow.process(flow.event("hello")).await;
//! ```
//!
//! ## Outcomes
//!
//! A step answers with a value (the next event), `Empty` (stop here, no
//! result), `Void` (carry on with the current event) or a `Failure` naming
//! the processor that failed and the event it was handed.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use sluice_core::{
    // Context
    ActiveEvent,
    // Error types
    BoxError,
    // Component handles
    Capabilities,
    // Chains
    Chain,
    ChainBuilder,
    Component,
    ConfigurationError,
    Context,
    Continuation,
    // Configuration
    DEFAULT_MAX_WORKERS,
    // Strategies
    Dispatch,
    DynInterceptor,
    DynProcessor,
    Element,
    // Events
    Event,
    EventBuilder,
    EventId,
    ExchangePattern,
    ExecutionInterceptor,
    FlowConstruct,
    // Processors
    Interceptor,
    InterceptorRef,
    // Lifecycle
    Lifecycle,
    LifecycleCoordinator,
    LifecycleError,
    LifecyclePhase,
    LifecycleState,
    NameSource,
    Next,
    // Notifications
    NotificationListener,
    NotificationManager,
    NotificationPhase,
    Outcome,
    PanicError,
    ProcessingError,
    ProcessingStrategy,
    Processor,
    ProcessorBuilder,
    ProcessorId,
    ProcessorInfo,
    ProcessorNotification,
    ProcessorRef,
    ReplyHandler,
    RequestPhase,
    RequestResponse,
    RequestResponseProcessor,
    RuntimeConfig,
    RuntimeContext,
    Session,
    SluiceError,
    StepDescriptor,
    StepFuture,
    SynchronousStrategy,
    TimeoutError,
    Variables,
};

// Flows
pub use sluice_std::{Flow, FlowBuilder};

/// Flow-level error handling.
pub mod error_handler {
    pub use sluice_std::error_handler::{ERROR_VARIABLE, ErrorHandler, OnErrorStrategy};
}

/// Processing strategies and the worker pool.
pub mod strategy {
    pub use sluice_std::strategy::{
        NonBlockingProcessingStrategy, PoolSnapshot, StageNames, SynchronousStrategy,
        WorkQueueProcessingStrategy, WorkerPool,
    };
}

/// Standard processors and wrappers.
pub mod processors {
    pub use sluice_std::processors::{
        Completion, CompletionDropped, LoggingProcessor, NonBlocking, NonBlockingProcessor,
        ResponseScopedAdapter, Timeout,
    };
}

/// Standard notification listeners.
pub mod listeners {
    pub use sluice_std::listeners::TracingListener;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use sluice_std::testing::*;
}

/// Tower integration.
#[cfg(feature = "tower")]
pub mod tower {
    pub use sluice_std::tower::{ChainService, ServiceProcessor};
}

/// Prelude module - common imports for Sluice.
///
/// # Usage
///
/// ```rust,ignore
/// use sluice::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Errors
        BoxError,
        // Chains
        Chain,
        ChainBuilder,
        Context,
        Element,
        // Events
        Event,
        ExchangePattern,
        // Flows
        Flow,
        // Core traits
        Interceptor,
        Lifecycle,
        Next,
        Outcome,
        ProcessingError,
        Processor,
        RequestPhase,
        RequestResponse,
        SluiceError,
    };
}
