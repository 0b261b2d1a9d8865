//! Error types for Sluice.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`SluiceError`] - Top-level error type for all Sluice operations
//! - [`ProcessingError`] - A step failed while handling an event
//! - [`LifecycleError`] - A lifecycle phase failed or was out of order
//! - [`ConfigurationError`] - A chain or flow could not be built

use std::{any::Any, time::Duration};
use thiserror::Error;

use crate::{
    component::ProcessorInfo,
    event::Event,
    lifecycle::{LifecyclePhase, LifecycleState},
};

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Sluice operations.
#[derive(Error, Debug)]
pub enum SluiceError {
    /// A step failed while processing an event.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// A lifecycle phase failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A chain or flow could not be built.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// A step failed while handling an event.
///
/// Carries the processor that failed and the event it was handed. The
/// event is the very instance passed to the processor, not a copy.
#[derive(Error, Debug)]
#[error("processor '{processor}' failed on event {}", .event.id())]
pub struct ProcessingError {
    #[source]
    cause: BoxError,
    processor: ProcessorInfo,
    event: Event,
}

impl ProcessingError {
    /// Creates a new processing error.
    pub fn new(cause: BoxError, processor: ProcessorInfo, event: Event) -> Self {
        Self {
            cause,
            processor,
            event,
        }
    }

    /// The underlying error.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Returns `true` if the underlying error is an `E`.
    pub fn is<E: std::error::Error + 'static>(&self) -> bool {
        self.cause.is::<E>()
    }

    /// The processor that failed.
    pub fn processor(&self) -> &ProcessorInfo {
        &self.processor
    }

    /// The event the failing processor was handed.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Takes the underlying error.
    pub fn into_cause(self) -> BoxError {
        self.cause
    }
}

/// A processor panicked.
#[derive(Error, Debug)]
#[error("processor panicked: {0}")]
pub struct PanicError(pub String);

impl PanicError {
    /// Extracts a message from a panic payload.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => payload
                .downcast_ref::<&'static str>()
                .map(|message| (*message).to_string())
                .unwrap_or_else(|| "unknown panic".to_string()),
        };
        Self(message)
    }
}

/// A step did not finish in time.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Errors from lifecycle phases.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A component's phase callback returned an error.
    #[error("{phase} failed for '{component}'")]
    Failed {
        /// The phase that failed.
        phase: LifecyclePhase,
        /// Name of the failing component.
        component: String,
        /// The error the component reported.
        #[source]
        cause: BoxError,
    },

    /// A phase was requested from a state that does not allow it.
    #[error("'{component}' cannot {to} while {from}")]
    InvalidTransition {
        /// Name of the component.
        component: String,
        /// The state it was in.
        from: LifecycleState,
        /// The phase that was requested.
        to: LifecyclePhase,
    },
}

impl LifecycleError {
    /// The component the error is about.
    pub fn component(&self) -> &str {
        match self {
            Self::Failed { component, .. } | Self::InvalidTransition { component, .. } => {
                component
            }
        }
    }
}

/// Errors raised while building chains and flows.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// An element could not be turned into a processor.
    #[error("element {position} could not be resolved: {reason}")]
    Unresolvable {
        /// Position of the element in the builder.
        position: usize,
        /// What went wrong.
        reason: String,
    },

    /// The processing strategy refused the configuration.
    #[error("processing strategy '{strategy}' rejected the configuration: {reason}")]
    Strategy {
        /// Name of the strategy.
        strategy: String,
        /// What went wrong.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let from_str = PanicError::from_payload(Box::new("static"));
        assert_eq!(from_str.0, "static");

        let from_string = PanicError::from_payload(Box::new(String::from("owned")));
        assert_eq!(from_string.to_string(), "processor panicked: owned");

        let other = PanicError::from_payload(Box::new(42_u8));
        assert_eq!(other.0, "unknown panic");
    }

    #[test]
    fn lifecycle_errors_name_the_component() {
        let err = LifecycleError::InvalidTransition {
            component: "append".into(),
            from: LifecycleState::Constructed,
            to: LifecyclePhase::Start,
        };
        assert_eq!(err.component(), "append");
        assert_eq!(err.to_string(), "'append' cannot start while constructed");
    }
}
