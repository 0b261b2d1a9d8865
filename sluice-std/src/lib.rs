//! # sluice-std
//!
//! Standard implementations for the Sluice processor-chain runtime.
//!
//! This crate provides:
//! - **Flows**: [`Flow`], the owning construct that ties a chain to a
//!   strategy, a runtime and a processor path registry
//! - **Error handling**: [`ErrorHandler`], ordered on-error strategies
//!   applied to a flow's failures
//! - **Processing strategies**: synchronous, non-blocking and work-queue
//!   scheduling on top of a bounded [`WorkerPool`](strategy::WorkerPool)
//! - **Processors**: the response-scoped adapter, non-blocking completion,
//!   timeout and logging wrappers
//! - **Listeners**: [`TracingListener`](listeners::TracingListener)
//! - **Testing**: recording processors and listeners

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use sluice_core;

// Modules
pub mod error_handler;
pub mod flow;
pub mod listeners;
pub mod processors;
pub mod strategy;
pub mod testing;

#[cfg(feature = "tower")]
pub mod tower;

pub use error_handler::{ErrorHandler, OnErrorStrategy};
pub use flow::{Flow, FlowBuilder};
