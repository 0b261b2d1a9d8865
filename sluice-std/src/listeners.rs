//! Standard notification listeners.

use sluice_core::{NotificationListener, NotificationPhase, ProcessorNotification};
use tracing::{debug, warn};

/// Emits every processor notification as a tracing event.
///
/// `Pre` and successful `Post` notifications log at `DEBUG`, failures at
/// `WARN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl NotificationListener for TracingListener {
    fn on_notification(&self, n: &ProcessorNotification<'_>) {
        let flow = n.flow.unwrap_or("-");
        match (n.phase, n.error) {
            (NotificationPhase::Pre, _) => {
                debug!(flow, path = n.path, processor = %n.processor, event_id = %n.event.id(), "processor starting");
            }
            (NotificationPhase::Post, None) => {
                debug!(flow, path = n.path, processor = %n.processor, event_id = %n.event.id(), "processor finished");
            }
            (NotificationPhase::Post, Some(error)) => {
                warn!(flow, path = n.path, processor = %n.processor, event_id = %n.event.id(), %error, "processor failed");
            }
        }
    }
}
