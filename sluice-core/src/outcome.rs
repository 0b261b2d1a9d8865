//! Step results.

use crate::{error::ProcessingError, event::Event};

/// What a processor, an interceptor or a whole chain produced.
#[derive(Debug)]
pub enum Outcome {
    /// Continue with this event.
    Value(Event),
    /// Explicit "no result". Ends the enclosing chain.
    Empty,
    /// Transparent. The event handed to the step carries on unchanged.
    Void,
    /// Processing failed.
    Failure(Box<ProcessingError>),
}

impl Outcome {
    /// Wraps a failure.
    pub fn failure(error: ProcessingError) -> Self {
        Self::Failure(Box::new(error))
    }

    /// Returns `true` for [`Outcome::Value`].
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns `true` for [`Outcome::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` for [`Outcome::Void`].
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Returns `true` for [`Outcome::Failure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The event, if this is a value.
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Value(event) => Some(event),
            _ => None,
        }
    }

    /// Consumes the outcome, returning the event if this is a value.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Value(event) => Some(event),
            _ => None,
        }
    }

    /// The failure, if any.
    pub fn as_failure(&self) -> Option<&ProcessingError> {
        match self {
            Self::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// Resolves a void outcome against the event that was handed to the step.
    pub fn or_resume(self, current: Event) -> Outcome {
        match self {
            Self::Void => Self::Value(current),
            other => other,
        }
    }

    /// Converts into the shape a caller sees: an event, nothing, or an error.
    ///
    /// Both [`Outcome::Empty`] and [`Outcome::Void`] become `Ok(None)`.
    pub fn into_result(self) -> Result<Option<Event>, ProcessingError> {
        match self {
            Self::Value(event) => Ok(Some(event)),
            Self::Empty | Self::Void => Ok(None),
            Self::Failure(error) => Err(*error),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Empty => "empty",
            Self::Void => "void",
            Self::Failure(_) => "failure",
        }
    }
}

impl From<Event> for Outcome {
    fn from(event: Event) -> Self {
        Self::Value(event)
    }
}
