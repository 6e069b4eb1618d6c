//! # Logging subscriber.
//!
//! [`LogWriter`] renders runtime events through `tracing`, one line per event.
//! Attempt-level events go to `debug`, terminal failures and diagnostics to
//! `warn`, successes to `info`.
//!
//! ## Output format (fmt subscriber)
//! ```text
//! DEBUG run=3 op=smtp-send attempt=1 [starting]
//! DEBUG run=3 op=smtp-send attempt=1 reason="connection refused" [failed]
//! DEBUG run=3 op=smtp-send attempt=1 delay_ms=10 [backoff]
//!  WARN run=3 op=smtp-send attempt=10 reason="connection refused" [exhausted]
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed logging subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let run = e.run.unwrap_or_default();
        let op = e.name.as_deref().unwrap_or("-");
        let attempt = e.attempt.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::AttemptStarting => debug!(run, op, attempt, "[starting]"),
            EventKind::AttemptSucceeded => debug!(run, op, attempt, "[succeeded]"),
            EventKind::AttemptFailed => debug!(run, op, attempt, reason, "[failed]"),
            EventKind::BackoffScheduled => {
                let delay_ms = e.delay_ms.unwrap_or_default();
                debug!(run, op, attempt, delay_ms, "[backoff]");
            }
            EventKind::RunSucceeded => info!(run, op, attempt, "[resolved]"),
            EventKind::RunExhausted => warn!(run, op, attempt, reason, "[exhausted]"),
            EventKind::RunRejected => warn!(run, op, attempt, reason, "[rejected]"),
            EventKind::RunCancelled => info!(run, op, attempt, "[cancelled]"),
            EventKind::ResultDiscarded => debug!(run, op, attempt, "[discarded]"),
            EventKind::ObserverPanicked => warn!(run, op, attempt, reason, "[observer-panicked]"),
            EventKind::PredicatePanicked => {
                warn!(run, op, attempt, reason, "[predicate-panicked]")
            }
            EventKind::SubscriberPanicked => warn!(subscriber = op, reason, "[subscriber-panicked]"),
            EventKind::SubscriberOverflow => warn!(subscriber = op, reason, "[subscriber-overflow]"),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
