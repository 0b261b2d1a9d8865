//! Testing utilities for Sluice.
//!
//! Test doubles that record what happens to them. All of them are cheap to
//! clone and clones share their records, so a test can keep one handle and
//! put the other into a chain.
//!
//! # Features
//!
//! - [`Appending`]: appends a suffix to the payload
//! - [`AppendingInterceptor`]: appends `before<suffix>` and `after<suffix>`
//!   around the rest of the chain, or stops it
//! - [`ReturnEmpty`], [`ReturnVoid`] and their intercepting variants
//! - [`Failing`]: returns an error, or panics
//! - [`DeferredAppending`]: a non-blocking processor completing from another task
//! - [`RecordingListener`]: records notifications
//! - [`LifecycleLog`]: records lifecycle calls and context injection

use parking_lot::Mutex;
use sluice_core::{
    BoxError, Context, Element, Event, EventId, FlowConstruct, Interceptor, Lifecycle,
    LifecyclePhase, Next, NotificationListener, NotificationPhase, Outcome, Processor,
    ProcessorNotification, RequestPhase, RequestResponse, RuntimeContext,
};
use std::{
    borrow::Cow,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::processors::{Completion, NonBlocking, NonBlockingProcessor};

/// Shared, ordered record of lifecycle calls across several components.
pub type Journal = Arc<Mutex<Vec<String>>>;

fn append(event: &Event, suffix: &str) -> Event {
    event.with_payload(format!("{}{suffix}", event.payload_text()))
}

// ============================================================================
// Lifecycle Log
// ============================================================================

/// Records lifecycle calls made on one component.
#[derive(Debug, Default)]
pub struct LifecycleLog {
    label: String,
    context_injected: AtomicBool,
    flow_injected: AtomicBool,
    counts: [AtomicUsize; 4],
    journal: Option<Journal>,
    fail_on: Mutex<Option<LifecyclePhase>>,
}

impl LifecycleLog {
    /// Creates a log for a component called `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Also writes `"<phase>:<label>"` to a shared journal.
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(Arc::clone(journal));
        self
    }

    /// Makes `phase` return an error from now on.
    pub fn fail_on(&self, phase: LifecyclePhase) {
        *self.fail_on.lock() = Some(phase);
    }

    /// Returns `true` once the runtime context was injected.
    pub fn context_injected(&self) -> bool {
        self.context_injected.load(Ordering::Acquire)
    }

    /// Returns `true` once the flow was injected.
    pub fn flow_injected(&self) -> bool {
        self.flow_injected.load(Ordering::Acquire)
    }

    /// How many times `phase` ran.
    pub fn count(&self, phase: LifecyclePhase) -> usize {
        self.counts[slot(phase)].load(Ordering::Acquire)
    }

    /// Returns `true` if context and flow were injected and every phase ran
    /// exactly once.
    pub fn completed_once(&self) -> bool {
        self.context_injected()
            && self.flow_injected()
            && self.counts.iter().all(|count| count.load(Ordering::Acquire) == 1)
    }

    fn record(&self, phase: LifecyclePhase) -> Result<(), BoxError> {
        self.counts[slot(phase)].fetch_add(1, Ordering::AcqRel);
        if let Some(journal) = &self.journal {
            journal.lock().push(format!("{phase}:{}", self.label));
        }
        if *self.fail_on.lock() == Some(phase) {
            return Err(format!("{} refused to {phase}", self.label).into());
        }
        Ok(())
    }
}

fn slot(phase: LifecyclePhase) -> usize {
    match phase {
        LifecyclePhase::Initialise => 0,
        LifecyclePhase::Start => 1,
        LifecyclePhase::Stop => 2,
        LifecyclePhase::Dispose => 3,
    }
}

impl Lifecycle for LifecycleLog {
    fn set_context(&self, _context: &Arc<RuntimeContext>) {
        self.context_injected.store(true, Ordering::Release);
    }

    fn set_flow(&self, _flow: &Arc<dyn FlowConstruct>) {
        self.flow_injected.store(true, Ordering::Release);
    }

    fn initialise(&self) -> Result<(), BoxError> {
        self.record(LifecyclePhase::Initialise)
    }

    fn start(&self) -> Result<(), BoxError> {
        self.record(LifecyclePhase::Start)
    }

    fn stop(&self) -> Result<(), BoxError> {
        self.record(LifecyclePhase::Stop)
    }

    fn dispose(&self) -> Result<(), BoxError> {
        self.record(LifecyclePhase::Dispose)
    }
}

/// Events seen by a test double.
#[derive(Debug, Clone, Default)]
struct Seen(Arc<Mutex<Vec<Event>>>);

impl Seen {
    fn push(&self, event: &Event) {
        self.0.lock().push(event.clone());
    }

    fn all(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    fn any(&self) -> bool {
        !self.0.lock().is_empty()
    }
}

// ============================================================================
// Appending
// ============================================================================

/// A processor appending a fixed suffix to the payload.
///
/// # Example
///
/// ```rust,ignore
/// let one = Appending::new("1");
/// let chain = ChainBuilder::new().processor(one.clone()).build()?;
///
/// chain.run(Event::new("0"), &cx).await; // "01"
/// assert!(one.invoked());
/// ```
#[derive(Debug, Clone)]
pub struct Appending {
    suffix: Arc<str>,
    seen: Seen,
    lifecycle: Arc<LifecycleLog>,
}

impl Appending {
    /// Appends `suffix`.
    pub fn new(suffix: &str) -> Self {
        Self::with_log(suffix, LifecycleLog::new(suffix))
    }

    /// Appends `suffix` and journals lifecycle calls.
    pub fn journaled(suffix: &str, journal: &Journal) -> Self {
        Self::with_log(suffix, LifecycleLog::new(suffix).with_journal(journal))
    }

    fn with_log(suffix: &str, log: LifecycleLog) -> Self {
        Self {
            suffix: Arc::from(suffix),
            seen: Seen::default(),
            lifecycle: Arc::new(log),
        }
    }

    /// Returns `true` if the processor ran at least once.
    pub fn invoked(&self) -> bool {
        self.seen.any()
    }

    /// The events it was handed, in order.
    pub fn invocations(&self) -> Vec<Event> {
        self.seen.all()
    }

    /// Its lifecycle record.
    pub fn lifecycle_log(&self) -> &LifecycleLog {
        &self.lifecycle
    }
}

impl Processor for Appending {
    async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
        self.seen.push(&event);
        Ok(Outcome::Value(append(&event, &self.suffix)))
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("append:{}", self.suffix))
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&*self.lifecycle)
    }
}

// ============================================================================
// Appending Interceptor
// ============================================================================

/// Appends `before<suffix>` on the way in and `after<suffix>` on the way out.
///
/// A stopping instance answers its request unchanged, so neither the rest
/// of the chain nor its own response phase runs.
#[derive(Debug, Clone)]
pub struct AppendingInterceptor {
    suffix: Arc<str>,
    stop: bool,
    requests: Seen,
    responses: Seen,
    lifecycle: Arc<LifecycleLog>,
}

impl AppendingInterceptor {
    /// An interceptor that proceeds.
    pub fn new(suffix: &str) -> Self {
        Self::build(suffix, false, LifecycleLog::new(suffix))
    }

    /// An interceptor that stops the rest of its chain.
    pub fn stopping(suffix: &str) -> Self {
        Self::build(suffix, true, LifecycleLog::new(suffix))
    }

    /// A proceeding interceptor that journals lifecycle calls.
    pub fn journaled(suffix: &str, journal: &Journal) -> Self {
        Self::build(suffix, false, LifecycleLog::new(suffix).with_journal(journal))
    }

    fn build(suffix: &str, stop: bool, log: LifecycleLog) -> Self {
        Self {
            suffix: Arc::from(suffix),
            stop,
            requests: Seen::default(),
            responses: Seen::default(),
            lifecycle: Arc::new(log),
        }
    }

    /// Returns `true` if the request phase ran.
    pub fn invoked(&self) -> bool {
        self.requests.any()
    }

    /// Returns `true` if the response phase ran.
    pub fn responded(&self) -> bool {
        self.responses.any()
    }

    /// Its lifecycle record.
    pub fn lifecycle_log(&self) -> &LifecycleLog {
        &self.lifecycle
    }
}

impl RequestResponse for AppendingInterceptor {
    async fn process_request(&self, event: Event, _cx: &Context) -> Result<RequestPhase, BoxError> {
        self.requests.push(&event);
        if self.stop {
            return Ok(RequestPhase::Respond(event));
        }
        Ok(RequestPhase::Proceed(append(&event, &format!("before{}", self.suffix))))
    }

    async fn process_response(&self, response: Event, _request: &Event, _cx: &Context) -> Result<Outcome, BoxError> {
        self.responses.push(&response);
        Ok(Outcome::Value(append(&response, &format!("after{}", self.suffix))))
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("intercept:{}", self.suffix))
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&*self.lifecycle)
    }
}

impl From<AppendingInterceptor> for Element {
    fn from(interceptor: AppendingInterceptor) -> Self {
        Element::request_response(interceptor)
    }
}

// ============================================================================
// Empty / Void
// ============================================================================

macro_rules! fixed_outcome {
    ($(#[$doc:meta])* $plain:ident, $(#[$idoc:meta])* $intercepting:ident, $outcome:expr, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default)]
        pub struct $plain {
            seen: Seen,
        }

        impl $plain {
            /// Creates a new instance.
            pub fn new() -> Self {
                Self::default()
            }

            /// Returns `true` if it ran.
            pub fn invoked(&self) -> bool {
                self.seen.any()
            }

            /// The events it was handed.
            pub fn invocations(&self) -> Vec<Event> {
                self.seen.all()
            }
        }

        impl Processor for $plain {
            async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
                self.seen.push(&event);
                Ok($outcome)
            }

            fn name(&self) -> Cow<'static, str> {
                Cow::Borrowed($label)
            }
        }

        $(#[$idoc])*
        #[derive(Debug, Clone, Default)]
        pub struct $intercepting {
            seen: Seen,
        }

        impl $intercepting {
            /// Creates a new instance.
            pub fn new() -> Self {
                Self::default()
            }

            /// Returns `true` if it ran.
            pub fn invoked(&self) -> bool {
                self.seen.any()
            }
        }

        impl Interceptor for $intercepting {
            async fn intercept(&self, event: Event, _next: Next, _cx: &Context) -> Result<Outcome, BoxError> {
                self.seen.push(&event);
                Ok($outcome)
            }

            fn name(&self) -> Cow<'static, str> {
                Cow::Borrowed(concat!($label, "-intercepting"))
            }
        }
    };
}

fixed_outcome!(
    /// Always returns [`Outcome::Empty`].
    ReturnEmpty,
    /// Returns [`Outcome::Empty`] without running the rest of its chain.
    ReturnEmptyInterceptor,
    Outcome::Empty,
    "empty"
);

fixed_outcome!(
    /// Always returns [`Outcome::Void`].
    ReturnVoid,
    /// Returns [`Outcome::Void`] without running the rest of its chain.
    ReturnVoidInterceptor,
    Outcome::Void,
    "void"
);

// ============================================================================
// Failing
// ============================================================================

/// A processor that fails every time.
#[derive(Debug, Clone)]
pub struct Failing {
    message: Arc<str>,
    panic: bool,
    seen: Seen,
}

impl Failing {
    /// Returns an error with `message`.
    pub fn new(message: &str) -> Self {
        Self {
            message: Arc::from(message),
            panic: false,
            seen: Seen::default(),
        }
    }

    /// Panics with `message` instead of returning an error.
    pub fn panicking(message: &str) -> Self {
        Self {
            panic: true,
            ..Self::new(message)
        }
    }

    /// How many times it ran.
    pub fn calls(&self) -> usize {
        self.seen.all().len()
    }

    /// The events it was handed.
    pub fn invocations(&self) -> Vec<Event> {
        self.seen.all()
    }
}

impl Processor for Failing {
    async fn process(&self, event: Event, _cx: &Context) -> Result<Outcome, BoxError> {
        self.seen.push(&event);
        if self.panic {
            panic!("{}", self.message);
        }
        Err(self.message.to_string().into())
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("failing")
    }
}

// ============================================================================
// Deferred Appending
// ============================================================================

/// A non-blocking processor that appends its suffix from a spawned task.
///
/// Requires a tokio runtime.
#[derive(Debug, Clone)]
pub struct DeferredAppending {
    suffix: Arc<str>,
    seen: Seen,
}

impl DeferredAppending {
    /// Appends `suffix` later.
    pub fn new(suffix: &str) -> Self {
        Self {
            suffix: Arc::from(suffix),
            seen: Seen::default(),
        }
    }

    /// Returns `true` if it ran.
    pub fn invoked(&self) -> bool {
        self.seen.any()
    }
}

impl NonBlockingProcessor for DeferredAppending {
    fn process_non_blocking(&self, event: Event, completion: Completion, _cx: &Context) -> Result<(), BoxError> {
        self.seen.push(&event);
        let suffix = Arc::clone(&self.suffix);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            completion.succeed(append(&event, &suffix));
        });
        Ok(())
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("deferred:{}", self.suffix))
    }
}

impl From<DeferredAppending> for Element {
    fn from(processor: DeferredAppending) -> Self {
        Element::processor(NonBlocking::new(processor))
    }
}

// ============================================================================
// Recording Listener
// ============================================================================

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    /// Before or after.
    pub phase: NotificationPhase,
    /// Processor name.
    pub processor: String,
    /// Processor path.
    pub path: String,
    /// Event id.
    pub event_id: EventId,
    /// Event payload as text.
    pub payload: String,
    /// Whether the notification carried an error.
    pub failed: bool,
}

/// A notification listener that keeps everything it hears.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    records: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingListener {
    /// Create a new recording listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn records(&self) -> Vec<Recorded> {
        self.records.lock().clone()
    }

    /// Number of recorded notifications in `phase`.
    pub fn count(&self, phase: NotificationPhase) -> usize {
        self.records.lock().iter().filter(|r| r.phase == phase).count()
    }

    /// Clear all records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl NotificationListener for RecordingListener {
    fn on_notification(&self, n: &ProcessorNotification<'_>) {
        self.records.lock().push(Recorded {
            phase: n.phase,
            processor: n.processor.name().to_string(),
            path: n.path.to_string(),
            event_id: n.event.id(),
            payload: n.event.payload_text().into_owned(),
            failed: n.error.is_some(),
        });
    }
}
