//! Processor notifications.
//!
//! Listeners registered with a [`NotificationManager`] hear about every
//! step before and after it runs, provided the event allows it and the
//! processor has a registered path in its flow.

use parking_lot::RwLock;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{component::ProcessorInfo, error::ProcessingError, event::Event};

/// Before or after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationPhase {
    /// About to invoke the processor.
    Pre,
    /// The processor returned or failed.
    Post,
}

/// One step notification.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorNotification<'a> {
    /// Name of the flow, if the chain runs inside one.
    pub flow: Option<&'a str>,
    /// For `Pre`, the event handed in. For `Post`, the result, or the
    /// input if the step produced no event.
    pub event: &'a Event,
    /// The processor.
    pub processor: &'a ProcessorInfo,
    /// The processor's path in its flow, e.g. `/orders/processors/2/0`.
    pub path: &'a str,
    /// Set on `Post` when the step failed.
    pub error: Option<&'a ProcessingError>,
    /// Before or after.
    pub phase: NotificationPhase,
}

/// Receives processor notifications.
pub trait NotificationListener: Send + Sync + 'static {
    /// Called synchronously on the processing task. Keep it short.
    fn on_notification(&self, notification: &ProcessorNotification<'_>);
}

/// Fans notifications out to registered listeners.
pub struct NotificationManager {
    listeners: RwLock<Vec<Arc<dyn NotificationListener>>>,
    enabled: AtomicBool,
}

impl NotificationManager {
    /// Creates a manager with no listeners.
    pub fn new(enabled: bool) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Adds a listener.
    pub fn register(&self, listener: Arc<dyn NotificationListener>) {
        self.listeners.write().push(listener);
    }

    /// Switches notifications on or off globally.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Returns `true` if notifications are on and someone is listening.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.listeners.read().is_empty()
    }

    /// Delivers a notification to every listener, in registration order.
    pub fn fire(&self, notification: &ProcessorNotification<'_>) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_notification(notification);
        }
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationManager")
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl NotificationListener for Counter {
        fn on_notification(&self, _notification: &ProcessorNotification<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn disabled_without_listeners() {
        let manager = NotificationManager::default();
        assert!(!manager.is_enabled());

        manager.register(Arc::new(Counter::default()));
        assert!(manager.is_enabled());

        manager.set_enabled(false);
        assert!(!manager.is_enabled());
    }
}
