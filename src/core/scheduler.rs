//! # RetryRun: the per-run retry state machine.
//!
//! Drives one [`Operation`](crate::Operation) under a [`RetryPolicy`] until the
//! shared [`Settle`] cell is settled.
//!
//! ## State machine
//! ```text
//! Idle ──► Attempting ──► Succeeded                              (resolve value)
//!              │
//!              └──► EvaluatingFailure ──► NonRetryable           (reject failure)
//!                         │          ├──► Exhausted              (reject last failure)
//!                         │          └──► Scheduling ──► Attempting (attempt + 1)
//!                         ▼
//!                   on_failure(attempt, max, failure)  (before classification)
//!
//! any state ──► Cancelled  (token fired / handle cancelled / runtime shutdown)
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially** (never concurrent for one run).
//! - Failure evaluation of attempt `n` strictly precedes dispatch of `n + 1`.
//! - The observer runs exactly once per failed attempt, before the backoff delay.
//! - Cancellation is checked at **safe points** (before dispatch, semaphore wait,
//!   after the observer, backoff sleep). An attempt in flight runs to completion; if the handle was
//!   settled meanwhile, its result is discarded and nothing else happens.
//! - A zero delay re-dispatches without suspending; ordering still holds.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::{select, sync::Semaphore, time};
use tracing::{debug, instrument, trace, warn};

use crate::{
    core::executor::{AttemptCtx, run_attempt},
    core::handle::Settle,
    error::{Failure, RetryError, panic_message},
    events::{Bus, Event, EventKind},
    ops::OperationRef,
    policies::RetryPolicy,
};

/// Outcome of evaluating a failed attempt.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Retry(Duration),
    Exhausted,
    NonRetryable,
}

/// Per-run state owned by one spawned task.
pub(crate) struct RetryRun<T> {
    /// Run identifier (stamped on every event).
    pub id: u64,
    pub op: OperationRef<T>,
    /// Read-only rules, possibly shared with other runs.
    pub policy: Arc<RetryPolicy>,
    /// Result cell shared with the caller's handle.
    pub settle: Arc<Settle<T>>,
    pub bus: Bus,
    /// Optional global limiter on attempts in flight.
    pub semaphore: Option<Arc<Semaphore>>,
}

impl<T: Send + 'static> RetryRun<T> {
    /// Runs attempts until the run settles.
    #[instrument(level = "debug", skip_all, fields(run = self.id, op = %self.op.name()))]
    pub(crate) async fn drive(self) {
        let token = self.settle.token().clone();
        // 0-based index of the next attempt == attempts dispatched so far.
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() || self.settle.is_claimed() {
                self.finish_cancelled(attempt);
                return;
            }

            let permit = match &self.semaphore {
                Some(sem) => select! {
                    res = Arc::clone(sem).acquire_owned() => match res {
                        Ok(permit) => Some(permit),
                        Err(_closed) => {
                            self.finish_cancelled(attempt);
                            return;
                        }
                    },
                    _ = token.cancelled() => {
                        self.finish_cancelled(attempt);
                        return;
                    }
                },
                None => None,
            };

            let ctx = AttemptCtx {
                run: self.id,
                attempt: attempt.saturating_add(1),
            };
            trace!(attempt = ctx.attempt, "dispatching attempt");
            let res = run_attempt(self.op.as_ref(), ctx, &self.bus).await;
            drop(permit);

            if token.is_cancelled() || self.settle.is_claimed() {
                self.discard(ctx.attempt);
                return;
            }

            let failure = match res {
                Ok(value) => {
                    if self.settle.resolve(value) {
                        debug!(attempt = ctx.attempt, "run resolved");
                        self.bus
                            .publish(self.event(EventKind::RunSucceeded, ctx.attempt));
                    } else {
                        self.discard(ctx.attempt);
                    }
                    return;
                }
                Err(failure) => failure,
            };

            self.observe(ctx.attempt, &failure);

            // The observer may have cancelled the run; nothing else may fire after that.
            if token.is_cancelled() || self.settle.is_claimed() {
                self.finish_cancelled(ctx.attempt);
                return;
            }

            match self.evaluate(attempt, &failure) {
                Verdict::NonRetryable => {
                    debug!(attempt = ctx.attempt, reason = %failure, "non-retryable failure");
                    let reason = failure.to_string();
                    let err = RetryError::Rejected {
                        attempt: ctx.attempt,
                        failure,
                    };
                    self.finish_rejected(EventKind::RunRejected, err, ctx.attempt, reason);
                    return;
                }
                Verdict::Exhausted => {
                    debug!(attempt = ctx.attempt, reason = %failure, "attempts exhausted");
                    let reason = failure.to_string();
                    let err = RetryError::Exhausted {
                        attempts: ctx.attempt,
                        last: failure,
                    };
                    self.finish_rejected(EventKind::RunExhausted, err, ctx.attempt, reason);
                    return;
                }
                Verdict::Retry(delay) => {
                    debug!(attempt = ctx.attempt, ?delay, reason = %failure, "retry scheduled");
                    self.bus.publish(
                        self.event(EventKind::BackoffScheduled, ctx.attempt)
                            .with_delay(delay)
                            .with_reason(failure.to_string()),
                    );

                    if !delay.is_zero() {
                        let sleep = time::sleep(delay);
                        tokio::pin!(sleep);
                        select! {
                            _ = &mut sleep => {}
                            _ = token.cancelled() => {
                                self.finish_cancelled(ctx.attempt);
                                return;
                            }
                        }
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Invokes the failure observer, isolating panics.
    fn observe(&self, attempt: u32, failure: &Failure) {
        let Some(observer) = self.policy.on_failure() else {
            return;
        };
        let max = self.policy.max_attempts();
        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| observer(attempt, max, failure)))
        {
            let info = panic_message(payload.as_ref());
            warn!(attempt, %info, "failure observer panicked; continuing");
            self.bus.publish(
                self.event(EventKind::ObserverPanicked, attempt)
                    .with_reason(info),
            );
        }
    }

    /// Classifies a failure of the 0-based attempt `attempt`.
    fn evaluate(&self, attempt: u32, failure: &Failure) -> Verdict {
        let retryable =
            match panic::catch_unwind(AssertUnwindSafe(|| self.policy.is_retryable(failure))) {
                Ok(retryable) => retryable,
                Err(payload) => {
                    let info = panic_message(payload.as_ref());
                    warn!(attempt = attempt.saturating_add(1), %info, "retry predicate panicked; failure is terminal");
                    self.bus.publish(
                        self.event(EventKind::PredicatePanicked, attempt.saturating_add(1))
                            .with_reason(info),
                    );
                    false
                }
            };

        if !retryable {
            Verdict::NonRetryable
        } else if !self.policy.max_attempts().allows_after(attempt) {
            Verdict::Exhausted
        } else {
            Verdict::Retry(self.policy.next_delay(attempt))
        }
    }

    fn finish_rejected(&self, kind: EventKind, err: RetryError, attempt: u32, reason: String) {
        if self.settle.reject(err) {
            self.bus
                .publish(self.event(kind, attempt).with_reason(reason));
        } else {
            self.discard(attempt);
        }
    }

    /// Settles as cancelled (no-op if the caller already did) and reports it.
    fn finish_cancelled(&self, attempts: u32) {
        self.settle.cancel();
        debug!(attempts, "run cancelled");
        self.bus
            .publish(self.event(EventKind::RunCancelled, attempts));
    }

    /// A late attempt result lost the settle race to cancellation.
    fn discard(&self, attempt: u32) {
        trace!(attempt, "discarding late attempt result");
        self.bus
            .publish(self.event(EventKind::ResultDiscarded, attempt));
        self.finish_cancelled(attempt);
    }

    fn event(&self, kind: EventKind, attempt: u32) -> Event {
        Event::new(kind)
            .with_run(self.id)
            .with_name(self.op.name())
            .with_attempt(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handle::Status;
    use crate::ops::AsyncFn;
    use crate::policies::BackoffPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_util::sync::CancellationToken;

    fn run_with(policy: RetryPolicy) -> RetryRun<()> {
        RetryRun {
            id: 1,
            op: AsyncFn::arc("noop", || async { Ok::<_, std::io::Error>(()) }),
            policy: Arc::new(policy),
            settle: Settle::new(CancellationToken::new()),
            bus: Bus::new(8),
            semaphore: None,
        }
    }

    #[test]
    fn evaluate_follows_policy() {
        let run = run_with(
            RetryPolicy::builder()
                .with_backoff(BackoffPolicy::incremental(
                    Duration::from_millis(10),
                    Duration::from_millis(10),
                ))
                .with_max_attempts(3)
                .with_retry_if(|f| f.message() != "fatal")
                .build()
                .unwrap(),
        );
        let transient = Failure::from_error("transient");

        assert_eq!(
            run.evaluate(0, &transient),
            Verdict::Retry(Duration::from_millis(10))
        );
        assert_eq!(
            run.evaluate(1, &transient),
            Verdict::Retry(Duration::from_millis(20))
        );
        assert_eq!(run.evaluate(2, &transient), Verdict::Exhausted);
        assert_eq!(
            run.evaluate(0, &Failure::from_error("fatal")),
            Verdict::NonRetryable
        );
    }

    #[test]
    fn panicking_predicate_is_terminal() {
        let run = run_with(
            RetryPolicy::builder()
                .with_max_attempts(5)
                .with_retry_if(|_| panic!("predicate bug"))
                .build()
                .unwrap(),
        );
        assert_eq!(
            run.evaluate(0, &Failure::from_error("x")),
            Verdict::NonRetryable
        );
    }

    #[tokio::test]
    async fn cancel_from_observer_stops_before_classification() {
        let settle: Arc<Settle<()>> = Settle::new(CancellationToken::new());
        let predicate_calls = Arc::new(AtomicU32::new(0));
        let calls = Arc::clone(&predicate_calls);
        let from_observer = Arc::clone(&settle);
        let policy = RetryPolicy::builder()
            .with_backoff(BackoffPolicy::fixed(Duration::from_millis(50)))
            .with_unbounded_attempts()
            .with_retry_if(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
            .with_on_failure(move |_, _, _| {
                from_observer.cancel();
            })
            .build()
            .unwrap();
        let run = RetryRun {
            id: 2,
            op: AsyncFn::arc("down", || async { Err::<(), _>("refused") }),
            policy: Arc::new(policy),
            settle: Arc::clone(&settle),
            bus: Bus::new(16),
            semaphore: None,
        };
        let mut rx = run.bus.subscribe();

        run.drive().await;

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::AttemptStarting,
                EventKind::AttemptFailed,
                EventKind::RunCancelled,
            ]
        );
        assert_eq!(predicate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(settle.status(), Status::Cancelled);
    }

    #[tokio::test]
    async fn pre_cancelled_run_never_dispatches() {
        let run = run_with(RetryPolicy::default());
        let settle = Arc::clone(&run.settle);
        let mut rx = run.bus.subscribe();

        assert!(settle.cancel());
        run.drive().await;

        assert_eq!(settle.status(), Status::Cancelled);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::RunCancelled);
        assert_eq!(ev.attempt, Some(0));
    }
}
