//! Component lifecycle.
//!
//! Components move through `initialise -> start -> stop -> dispose`. Every
//! chain cascades these phases to what it contains, and every instance runs
//! each phase at most once no matter how many chains reach it.
//!
//! Ordering:
//!
//! - `initialise` and `start` run in build order and stop at the first error.
//! - `stop` and `dispose` run in reverse build order, keep going past
//!   errors, and report the first one at the end.

use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, warn};

use crate::{
    component::Component,
    context::{FlowConstruct, RuntimeContext},
    error::{BoxError, LifecycleError},
};

/// Lifecycle callbacks. Every method defaults to a no-op.
pub trait Lifecycle: Send + Sync {
    /// Receives the runtime context. Called once, before `initialise`.
    fn set_context(&self, _context: &Arc<RuntimeContext>) {}

    /// Receives the owning flow. Called once, before `initialise`.
    fn set_flow(&self, _flow: &Arc<dyn FlowConstruct>) {}

    /// Prepares the component.
    fn initialise(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Starts the component.
    fn start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Stops the component.
    fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Releases the component's resources.
    fn dispose(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// `initialise`
    Initialise,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `dispose`
    Dispose,
}

impl LifecyclePhase {
    pub(crate) fn apply(self, lifecycle: &dyn Lifecycle) -> Result<(), BoxError> {
        match self {
            Self::Initialise => lifecycle.initialise(),
            Self::Start => lifecycle.start(),
            Self::Stop => lifecycle.stop(),
            Self::Dispose => lifecycle.dispose(),
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initialise => "initialise",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Dispose => "dispose",
        })
    }
}

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Built, nothing run yet.
    #[default]
    Constructed,
    /// `initialise` succeeded.
    Initialised,
    /// `start` succeeded.
    Started,
    /// `stop` ran.
    Stopped,
    /// `dispose` ran.
    Disposed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Constructed => "constructed",
            Self::Initialised => "initialised",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
        })
    }
}

enum Step {
    Run(LifecycleState),
    Skip,
    Reject,
}

/// `composite` marks components that contain others. A composite whose own
/// start failed partway may still hold started members, so stopping it
/// from `Initialised` cascades instead of being skipped.
fn plan(from: LifecycleState, phase: LifecyclePhase, composite: bool) -> Step {
    use LifecyclePhase as P;
    use LifecycleState as S;

    match (phase, from) {
        (P::Initialise, S::Constructed) => Step::Run(S::Initialised),
        (P::Initialise, S::Disposed) => Step::Reject,
        (P::Initialise, _) => Step::Skip,

        (P::Start, S::Initialised | S::Stopped) => Step::Run(S::Started),
        (P::Start, S::Started) => Step::Skip,
        (P::Start, _) => Step::Reject,

        (P::Stop, S::Started) => Step::Run(S::Stopped),
        (P::Stop, S::Initialised) if composite => Step::Run(S::Stopped),
        (P::Stop, _) => Step::Skip,

        (P::Dispose, S::Disposed) => Step::Skip,
        (P::Dispose, _) => Step::Run(S::Disposed),
    }
}

/// Per-instance lifecycle bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct LifecycleGuard {
    state: Mutex<LifecycleState>,
    context_injected: AtomicBool,
    flow_injected: AtomicBool,
}

impl LifecycleGuard {
    pub(crate) fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Returns `true` the first time it is called.
    pub(crate) fn mark_context(&self) -> bool {
        !self.context_injected.swap(true, Ordering::AcqRel)
    }

    /// Returns `true` the first time it is called.
    pub(crate) fn mark_flow(&self) -> bool {
        !self.flow_injected.swap(true, Ordering::AcqRel)
    }

    /// Runs `callback` if `phase` is due. The lock is held for the whole
    /// callback so concurrent cascades cannot run a phase twice.
    pub(crate) fn transition(
        &self,
        phase: LifecyclePhase,
        component: &str,
        composite: bool,
        callback: impl FnOnce() -> Result<(), BoxError>,
    ) -> Result<bool, LifecycleError> {
        let mut state = self.state.lock();
        let target = match plan(*state, phase, composite) {
            Step::Run(target) => target,
            Step::Skip => return Ok(false),
            Step::Reject => {
                return Err(LifecycleError::InvalidTransition {
                    component: component.to_string(),
                    from: *state,
                    to: phase,
                });
            }
        };

        match callback() {
            Ok(()) => {
                *state = target;
                Ok(true)
            }
            Err(cause) => {
                // a failed stop or dispose is not retried
                if matches!(phase, LifecyclePhase::Stop | LifecyclePhase::Dispose) {
                    *state = target;
                }
                Err(LifecycleError::Failed {
                    phase,
                    component: component.to_string(),
                    cause,
                })
            }
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Drives the lifecycle of an ordered set of components.
#[derive(Debug, Clone, Default)]
pub struct LifecycleCoordinator {
    members: Arc<[Component]>,
}

impl LifecycleCoordinator {
    /// Coordinates `members`, in build order.
    pub fn new(members: Vec<Component>) -> Self {
        Self {
            members: members.into(),
        }
    }

    /// The coordinated components.
    pub fn members(&self) -> &[Component] {
        &self.members
    }

    /// Injects the runtime context into every member.
    pub fn set_context(&self, context: &Arc<RuntimeContext>) {
        for member in self.members.iter() {
            member.inject_context(context);
        }
    }

    /// Injects the owning flow into every member.
    pub fn set_flow(&self, flow: &Arc<dyn FlowConstruct>) {
        for member in self.members.iter() {
            member.inject_flow(flow);
        }
    }

    /// Initialises members in order, stopping at the first error.
    pub fn initialise(&self) -> Result<(), LifecycleError> {
        self.forward(LifecyclePhase::Initialise)
    }

    /// Starts members in order, stopping at the first error.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.forward(LifecyclePhase::Start)
    }

    /// Stops members in reverse order. Every member is attempted.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.reverse(LifecyclePhase::Stop)
    }

    /// Disposes members in reverse order. Every member is attempted.
    pub fn dispose(&self) -> Result<(), LifecycleError> {
        self.reverse(LifecyclePhase::Dispose)
    }

    fn forward(&self, phase: LifecyclePhase) -> Result<(), LifecycleError> {
        for member in self.members.iter() {
            if member.transition(phase)? {
                debug!(component = member.name(), %phase, "lifecycle phase complete");
            }
        }
        Ok(())
    }

    fn reverse(&self, phase: LifecyclePhase) -> Result<(), LifecycleError> {
        let mut first = None;
        for member in self.members.iter().rev() {
            match member.transition(phase) {
                Ok(true) => debug!(component = member.name(), %phase, "lifecycle phase complete"),
                Ok(false) => {}
                Err(err) => {
                    warn!(component = member.name(), %phase, error = %err, "lifecycle phase failed");
                    first.get_or_insert(err);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}
