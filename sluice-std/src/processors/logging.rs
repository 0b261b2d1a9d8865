//! Logging step for event observation.

use sluice_core::{BoxError, Capabilities, Context, Event, Outcome, Processor};
use std::borrow::Cow;
use tracing::{Level, debug, error, info, trace, warn};

/// A pass-through step that logs every event it sees.
#[derive(Debug, Clone)]
pub struct LoggingProcessor {
    label: Cow<'static, str>,
    level: Level,
}

impl LoggingProcessor {
    /// Logs at `INFO` under `label`.
    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            level: Level::INFO,
        }
    }

    /// Changes the level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Processor for LoggingProcessor {
    async fn process(&self, event: Event, cx: &Context) -> Result<Outcome, BoxError> {
        let flow = cx.flow().map(|flow| flow.name().to_string());
        let label = &self.label;
        // tracing needs the level as a constant
        if self.level == Level::ERROR {
            error!(%label, ?flow, ?event, "event");
        } else if self.level == Level::WARN {
            warn!(%label, ?flow, ?event, "event");
        } else if self.level == Level::INFO {
            info!(%label, ?flow, ?event, "event");
        } else if self.level == Level::DEBUG {
            debug!(%label, ?flow, ?event, "event");
        } else {
            trace!(%label, ?flow, ?event, "event");
        }
        Ok(Outcome::Void)
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("log:{}", self.label))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }
}
