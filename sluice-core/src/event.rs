//! The unit of work flowing through a chain.
//!
//! An [`Event`] is an immutable, cheaply clonable handle. Processors that
//! want to change it build a copy through one of the `with_*` methods and
//! return the copy. Reference identity is observable with [`Event::ptr_eq`],
//! so a caller can tell "the very event I handed in" from "a copy of it".

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::outcome::Outcome;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Identity
// ============================================================================

/// Process-unique identifier of an event.
///
/// Copies made through the `with_*` methods keep the id of their source;
/// it identifies the logical message, not the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the caller waits for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangePattern {
    /// Fire and forget.
    OneWay,
    /// The caller expects the final event back.
    #[default]
    RequestResponse,
}

impl ExchangePattern {
    /// Returns `true` for [`ExchangePattern::RequestResponse`].
    pub fn has_response(self) -> bool {
        matches!(self, Self::RequestResponse)
    }
}

// ============================================================================
// Variables
// ============================================================================

/// Named values attached to an event. Lookups ignore ASCII case.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    entries: HashMap<String, (String, Value)>,
}

impl Variables {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a value, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&fold(name)).map(|(_, value)| value)
    }

    /// Inserts or replaces a value, returning the previous one.
    ///
    /// The spelling of the most recent insert is the one reported by
    /// [`Variables::iter`].
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        self.entries
            .insert(fold(&name), (name, value.into()))
            .map(|(_, previous)| previous)
    }

    /// Removes a value, ignoring case.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(&fold(name)).map(|(_, value)| value)
    }

    /// Returns `true` if a value is present under `name`, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&fold(name))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value))
    }
}

fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

// ============================================================================
// Session
// ============================================================================

/// State shared by every copy of an event.
///
/// Unlike [`Variables`], a session is not copied on write: all events
/// derived from one another see the same session.
#[derive(Clone, Default)]
pub struct Session {
    values: Arc<RwLock<Variables>>,
}

impl Session {
    /// Creates a fresh, empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a value.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    /// Writes a value, visible to every event sharing this session.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.write().insert(name, value)
    }

    /// Removes a value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.write().remove(name)
    }

    /// Returns `true` if both handles point at the same session.
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("len", &self.values.read().len())
            .finish()
    }
}

/// Receives the final result of a request-response event.
pub trait ReplyHandler: Send + Sync + 'static {
    /// Called once, after the flow finished processing the event.
    fn on_reply(&self, outcome: &Outcome);
}

// ============================================================================
// Event
// ============================================================================

/// An immutable message travelling through a chain.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventData>,
}

#[derive(Clone)]
struct EventData {
    id: EventId,
    correlation_id: Option<String>,
    payload: Value,
    variables: Variables,
    session: Session,
    exchange_pattern: ExchangePattern,
    synchronous: bool,
    allow_non_blocking: bool,
    notifications_enabled: bool,
    reply_to: Option<Arc<dyn ReplyHandler>>,
}

impl Event {
    /// Creates a request-response event with default settings.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self::builder(payload).build()
    }

    /// Starts building an event.
    pub fn builder(payload: impl Into<Value>) -> EventBuilder {
        EventBuilder::new(payload)
    }

    /// The logical id, shared by copies.
    pub fn id(&self) -> EventId {
        self.inner.id
    }

    /// Correlation id, if the event belongs to a group.
    pub fn correlation_id(&self) -> Option<&str> {
        self.inner.correlation_id.as_deref()
    }

    /// The message body.
    pub fn payload(&self) -> &Value {
        &self.inner.payload
    }

    /// The payload as text: strings verbatim, everything else as JSON.
    pub fn payload_text(&self) -> Cow<'_, str> {
        match &self.inner.payload {
            Value::String(text) => Cow::Borrowed(text),
            Value::Null => Cow::Borrowed(""),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Event-scoped variables.
    pub fn variables(&self) -> &Variables {
        &self.inner.variables
    }

    /// Shorthand for `self.variables().get(name)`.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.inner.variables.get(name)
    }

    /// The session shared with every copy of this event.
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// The exchange pattern.
    pub fn exchange_pattern(&self) -> ExchangePattern {
        self.inner.exchange_pattern
    }

    /// Returns `true` if the event must be processed on the caller's task.
    pub fn is_synchronous(&self) -> bool {
        self.inner.synchronous
    }

    /// Returns `true` if steps may be moved to worker tasks.
    ///
    /// A synchronous event never allows non-blocking processing, whatever
    /// it was built with.
    pub fn allow_non_blocking(&self) -> bool {
        self.inner.allow_non_blocking && !self.inner.synchronous
    }

    /// Returns `true` if processor notifications should fire for this event.
    pub fn notifications_enabled(&self) -> bool {
        self.inner.notifications_enabled
    }

    /// Where the final result goes, if anywhere.
    pub fn reply_to(&self) -> Option<&Arc<dyn ReplyHandler>> {
        self.inner.reply_to.as_ref()
    }

    /// Returns `true` if both handles refer to the same event instance.
    pub fn ptr_eq(a: &Event, b: &Event) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// A new instance with identical content.
    pub fn copy(&self) -> Event {
        self.derive(|_| {})
    }

    /// A copy carrying a different payload.
    pub fn with_payload(&self, payload: impl Into<Value>) -> Event {
        let payload = payload.into();
        self.derive(|data| data.payload = payload)
    }

    /// A copy with one variable set.
    pub fn with_variable(&self, name: impl Into<String>, value: impl Into<Value>) -> Event {
        let (name, value) = (name.into(), value.into());
        self.derive(|data| {
            data.variables.insert(name, value);
        })
    }

    /// A copy with one variable removed.
    pub fn without_variable(&self, name: &str) -> Event {
        self.derive(|data| {
            data.variables.remove(name);
        })
    }

    /// A copy with notifications switched on or off.
    pub fn with_notifications(&self, enabled: bool) -> Event {
        self.derive(|data| data.notifications_enabled = enabled)
    }

    fn derive(&self, change: impl FnOnce(&mut EventData)) -> Event {
        let mut data = EventData::clone(&self.inner);
        change(&mut data);
        Event {
            inner: Arc::new(data),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id)
            .field("payload", &self.inner.payload)
            .field("exchange_pattern", &self.inner.exchange_pattern)
            .field("synchronous", &self.inner.synchronous)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Event`].
pub struct EventBuilder {
    data: EventData,
}

impl EventBuilder {
    fn new(payload: impl Into<Value>) -> Self {
        Self {
            data: EventData {
                id: EventId::next(),
                correlation_id: None,
                payload: payload.into(),
                variables: Variables::new(),
                session: Session::new(),
                exchange_pattern: ExchangePattern::default(),
                synchronous: false,
                allow_non_blocking: false,
                notifications_enabled: true,
                reply_to: None,
            },
        }
    }

    /// Sets the correlation id.
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.data.correlation_id = Some(id.into());
        self
    }

    /// Adds a variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.variables.insert(name, value);
        self
    }

    /// Joins an existing session instead of starting a new one.
    pub fn session(mut self, session: Session) -> Self {
        self.data.session = session;
        self
    }

    /// Sets the exchange pattern.
    pub fn exchange_pattern(mut self, pattern: ExchangePattern) -> Self {
        self.data.exchange_pattern = pattern;
        self
    }

    /// Forces processing on the caller's task.
    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.data.synchronous = synchronous;
        self
    }

    /// Permits processing strategies to move steps to worker tasks.
    pub fn allow_non_blocking(mut self, allow: bool) -> Self {
        self.data.allow_non_blocking = allow;
        self
    }

    /// Enables or disables processor notifications for this event.
    pub fn notifications_enabled(mut self, enabled: bool) -> Self {
        self.data.notifications_enabled = enabled;
        self
    }

    /// Registers a reply destination.
    pub fn reply_to(mut self, handler: Arc<dyn ReplyHandler>) -> Self {
        self.data.reply_to = Some(handler);
        self
    }

    /// Finishes the event.
    pub fn build(self) -> Event {
        Event {
            inner: Arc::new(self.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_keep_id_but_not_identity() {
        let event = Event::new("a");
        let copy = event.with_payload("b");

        assert_eq!(event.id(), copy.id());
        assert!(!Event::ptr_eq(&event, &copy));
        assert!(Event::ptr_eq(&event, &event.clone()));
        assert_eq!(event.payload_text(), "a");
        assert_eq!(copy.payload_text(), "b");
    }

    #[test]
    fn variables_ignore_case() {
        let event = Event::builder("x").variable("Customer", 7).build();

        assert_eq!(event.variable("customer"), Some(&Value::from(7)));
        assert_eq!(event.variable("CUSTOMER"), Some(&Value::from(7)));

        let removed = event.without_variable("cUsToMeR");
        assert!(removed.variables().is_empty());
        assert!(event.variables().contains("customer"));
    }

    #[test]
    fn session_is_shared_between_copies() {
        let event = Event::new("x");
        let copy = event.with_variable("k", "v");

        copy.session().set("seen", true);

        assert!(event.session().ptr_eq(copy.session()));
        assert_eq!(event.session().get("SEEN"), Some(Value::Bool(true)));
    }

    #[test]
    fn synchronous_events_never_allow_non_blocking() {
        let event = Event::builder("x")
            .allow_non_blocking(true)
            .synchronous(true)
            .build();
        assert!(!event.allow_non_blocking());

        let event = Event::builder("x").allow_non_blocking(true).build();
        assert!(event.allow_non_blocking());
    }

    #[test]
    fn exchange_pattern_serializes_like_config() {
        let json = serde_json::to_string(&ExchangePattern::OneWay).unwrap();
        assert_eq!(json, "\"ONE_WAY\"");
        assert!(ExchangePattern::RequestResponse.has_response());
    }
}
