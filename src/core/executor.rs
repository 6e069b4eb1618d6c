//! # Run a single attempt of an operation.
//!
//! Executes one attempt of an [`Operation`] and publishes its lifecycle events
//! to the [`Bus`].
//!
//! ## Event flow
//! ```text
//! Success:
//!   op.attempt() → Ok(value)  → publish AttemptSucceeded
//!
//! Failure:
//!   op.attempt() → Err(failure) → publish AttemptFailed
//!
//! Panic (while building or polling the attempt future):
//!   catch_unwind → Failure::Panic → publish AttemptFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal attempt event.
//! - Never unwinds into the scheduler: every panic becomes a [`Failure`].

use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;

use crate::{
    error::Failure,
    events::{Bus, Event, EventKind},
    ops::Operation,
};

/// Identifies the attempt for event publishing.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AttemptCtx {
    pub run: u64,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Executes a single attempt of `op`, capturing errors and panics.
pub(crate) async fn run_attempt<T: 'static>(
    op: &dyn Operation<T>,
    ctx: AttemptCtx,
    bus: &Bus,
) -> Result<T, Failure> {
    bus.publish(event(EventKind::AttemptStarting, op, ctx));

    let res = match panic::catch_unwind(AssertUnwindSafe(|| op.attempt())) {
        Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => Err(Failure::from_panic(payload)),
        },
        Err(payload) => Err(Failure::from_panic(payload)),
    };

    match &res {
        Ok(_) => bus.publish(event(EventKind::AttemptSucceeded, op, ctx)),
        Err(failure) => bus.publish(
            event(EventKind::AttemptFailed, op, ctx).with_reason(failure.to_string()),
        ),
    }
    res
}

fn event<T: 'static>(kind: EventKind, op: &dyn Operation<T>, ctx: AttemptCtx) -> Event {
    Event::new(kind)
        .with_run(ctx.run)
        .with_name(op.name())
        .with_attempt(ctx.attempt)
}
