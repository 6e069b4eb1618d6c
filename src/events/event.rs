//! # Runtime events emitted by retry runs.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Attempt events**: one attempt's flow (starting, succeeded, failed, backoff)
//! - **Run events**: the single terminal outcome of a run
//! - **Diagnostic events**: isolated faults (observer/subscriber panics, overflow)
//!
//! The [`Event`] struct carries metadata such as timestamps, run id, operation
//! name, attempt number, reasons and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one run, `AttemptFailed(n)` always precedes `BackoffScheduled(n)`, which
//! precedes `AttemptStarting(n + 1)`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use retryvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AttemptFailed)
//!     .with_run(7)
//!     .with_name("smtp-send")
//!     .with_reason("connection refused")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_millis(10));
//!
//! assert_eq!(ev.kind, EventKind::AttemptFailed);
//! assert_eq!(ev.name.as_deref(), Some("smtp-send"));
//! assert_eq!(ev.delay_ms, Some(10));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Attempt events ===
    /// An attempt is being dispatched.
    ///
    /// Sets: `run`, `name`, `attempt` (1-based)
    AttemptStarting,

    /// The attempt produced a value.
    ///
    /// Sets: `run`, `name`, `attempt`
    AttemptSucceeded,

    /// The attempt failed (error or captured panic).
    ///
    /// Sets: `run`, `name`, `attempt`, `reason`
    AttemptFailed,

    /// A retryable failure was evaluated and the next attempt is armed.
    ///
    /// Sets: `run`, `name`, `attempt` (the failed one), `delay_ms`, `reason`
    BackoffScheduled,

    // === Run terminal events (exactly one per run) ===
    /// The run resolved with a value.
    ///
    /// Sets: `run`, `name`, `attempt`
    RunSucceeded,

    /// Every permitted attempt failed; rejected with the last failure.
    ///
    /// Sets: `run`, `name`, `attempt`, `reason`
    RunExhausted,

    /// A failure was classified non-retryable.
    ///
    /// Sets: `run`, `name`, `attempt`, `reason`
    RunRejected,

    /// The run was cancelled (caller or runtime shutdown).
    ///
    /// Sets: `run`, `name`, `attempt` (attempts dispatched so far)
    RunCancelled,

    // === Diagnostics ===
    /// An in-flight attempt finished after the run was cancelled; its result was dropped.
    ///
    /// Sets: `run`, `name`, `attempt`
    ResultDiscarded,

    /// The failure observer panicked; the run continued.
    ///
    /// Sets: `run`, `name`, `attempt`, `reason`
    ObserverPanicked,

    /// The retryable predicate panicked; the failure was treated as terminal.
    ///
    /// Sets: `run`, `name`, `attempt`, `reason`
    PredicatePanicked,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `name` (subscriber), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `name` (subscriber), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Run identifier.
    pub run: Option<u64>,
    /// Operation (or subscriber) name.
    pub name: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (failure message, panic info, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            run: None,
            name: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_run(mut self, run: u64) -> Self {
        self.run = Some(run);
        self
    }

    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    /// True for the four kinds that end a run.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::RunSucceeded
                | EventKind::RunExhausted
                | EventKind::RunRejected
                | EventKind::RunCancelled
        )
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
