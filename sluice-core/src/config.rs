//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::event::ExchangePattern;

/// Worker limit used when nothing else is configured.
pub const DEFAULT_MAX_WORKERS: usize = 128;

/// Settings shared by every flow of a runtime.
///
/// Deserializes from any serde format; missing fields take their defaults.
///
/// ```rust,ignore
/// let config: RuntimeConfig = serde_json::from_str(r#"{ "max_workers": 16 }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Global switch for processor notifications.
    pub notifications_enabled: bool,
    /// Upper bound on concurrently running worker tasks per strategy.
    pub max_workers: usize,
    /// Exchange pattern for events created through a flow.
    pub default_exchange_pattern: ExchangePattern,
}

impl RuntimeConfig {
    /// Sets [`RuntimeConfig::notifications_enabled`].
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// Sets [`RuntimeConfig::max_workers`].
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets [`RuntimeConfig::default_exchange_pattern`].
    pub fn with_exchange_pattern(mut self, pattern: ExchangePattern) -> Self {
        self.default_exchange_pattern = pattern;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            max_workers: DEFAULT_MAX_WORKERS,
            default_exchange_pattern: ExchangePattern::RequestResponse,
        }
    }
}
