//! Runtime and per-invocation context.

use parking_lot::Mutex;
use std::{fmt, sync::Arc};

use crate::{
    component::ProcessorId,
    config::RuntimeConfig,
    event::{Event, EventId},
    notification::NotificationManager,
    strategy::{ProcessingStrategy, SynchronousStrategy},
};

/// Process-wide services shared by every flow.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    config: RuntimeConfig,
    notifications: NotificationManager,
}

impl RuntimeContext {
    /// Creates a runtime from configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let notifications = NotificationManager::new(config.notifications_enabled);
        Self {
            config,
            notifications,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The notification manager.
    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }
}

/// The named unit owning a chain.
///
/// Chains ask their flow for processor paths (to decide whether to notify),
/// for the processing strategy, and whether it has been stopped.
pub trait FlowConstruct: Send + Sync + 'static {
    /// The flow's name.
    fn name(&self) -> &str;

    /// The registered path of a processor, if it belongs to this flow.
    fn processor_path(&self, processor: ProcessorId) -> Option<String>;

    /// How this flow schedules steps.
    fn processing_strategy(&self) -> Arc<dyn ProcessingStrategy>;

    /// Returns `true` once the flow has been stopped.
    fn is_stopped(&self) -> bool {
        false
    }
}

/// The event currently being processed, for diagnostics.
///
/// Updated before each step and before crossing into a worker task. Purely
/// informational; nothing reads it to make decisions.
#[derive(Clone, Default)]
pub struct ActiveEvent(Arc<Mutex<Option<EventId>>>);

impl ActiveEvent {
    /// Records `event` as active.
    pub fn bind(&self, event: &Event) {
        *self.0.lock() = Some(event.id());
    }

    /// The most recently bound event.
    pub fn current(&self) -> Option<EventId> {
        *self.0.lock()
    }
}

impl fmt::Debug for ActiveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveEvent").field(&self.current()).finish()
    }
}

/// Everything a step needs besides its event.
///
/// Cheap to clone and `'static`, so it can cross into worker tasks.
#[derive(Clone)]
pub struct Context {
    runtime: Arc<RuntimeContext>,
    flow: Option<Arc<dyn FlowConstruct>>,
    strategy: Arc<dyn ProcessingStrategy>,
    active: ActiveEvent,
}

impl Context {
    /// A context outside any flow, processing everything inline.
    pub fn new(runtime: Arc<RuntimeContext>) -> Self {
        Self {
            runtime,
            flow: None,
            strategy: Arc::new(SynchronousStrategy),
            active: ActiveEvent::default(),
        }
    }

    /// A context with a fresh default runtime.
    pub fn detached() -> Self {
        Self::new(Arc::new(RuntimeContext::default()))
    }

    /// A context for one invocation of `flow`, using its strategy.
    pub fn for_flow(runtime: Arc<RuntimeContext>, flow: Arc<dyn FlowConstruct>) -> Self {
        let strategy = flow.processing_strategy();
        Self {
            runtime,
            flow: Some(flow),
            strategy,
            active: ActiveEvent::default(),
        }
    }

    /// Replaces the processing strategy.
    pub fn with_strategy(mut self, strategy: Arc<dyn ProcessingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// The runtime.
    pub fn runtime(&self) -> &Arc<RuntimeContext> {
        &self.runtime
    }

    /// The owning flow, if any.
    pub fn flow(&self) -> Option<&Arc<dyn FlowConstruct>> {
        self.flow.as_ref()
    }

    /// The processing strategy.
    pub fn strategy(&self) -> &Arc<dyn ProcessingStrategy> {
        &self.strategy
    }

    /// Diagnostic record of the current event.
    pub fn active_event(&self) -> &ActiveEvent {
        &self.active
    }

    /// Shorthand for `self.active_event().bind(event)`.
    pub fn bind_active(&self, event: &Event) {
        self.active.bind(event);
    }

    /// Returns `true` if the owning flow has been stopped.
    pub fn is_flow_stopped(&self) -> bool {
        self.flow.as_ref().is_some_and(|flow| flow.is_stopped())
    }

    /// The path of `processor` in the owning flow.
    pub fn processor_path(&self, processor: ProcessorId) -> Option<String> {
        self.flow.as_ref()?.processor_path(processor)
    }

    /// Returns `true` if notifications should fire for `event`.
    pub fn notifications_enabled(&self, event: &Event) -> bool {
        event.notifications_enabled() && self.runtime.notifications().is_enabled()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("flow", &self.flow.as_ref().map(|flow| flow.name().to_string()))
            .field("strategy", &self.strategy.name())
            .field("active", &self.active)
            .finish()
    }
}
