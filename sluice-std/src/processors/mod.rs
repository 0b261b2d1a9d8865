//! Standard processors and processor wrappers.

mod logging;
mod non_blocking;
mod response;
mod timeout;

pub use logging::LoggingProcessor;
pub use non_blocking::{Completion, CompletionDropped, NonBlocking, NonBlockingProcessor};
pub use response::ResponseScopedAdapter;
pub use timeout::Timeout;
