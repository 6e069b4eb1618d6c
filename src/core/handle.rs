//! # RetryHandle: the caller-facing, settle-once result of a run.
//!
//! A run's outcome lives in a shared [`Settle`] cell with states:
//!
//! ```text
//!               ┌──► RESOLVED  (value)
//! PENDING ──► SETTLING ──► REJECTED  (RetryError::Exhausted / Rejected)
//!               └──► CANCELLED (RetryError::Cancelled)
//! ```
//!
//! ## Rules
//! - The `PENDING → SETTLING` step is a compare-and-set: exactly one of
//!   {success, terminal failure, cancellation} wins; every later settle is a no-op.
//! - `SETTLING` is never observable: [`RetryHandle::status`] reports it as
//!   `Pending`, so non-blocking readers only ever see a fully settled state.
//! - The scheduler is the only writer of values; the caller (or a
//!   [`CancelHandle`]) may only write cancellation.
//! - Dropping a handle does **not** cancel the run.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::RetryError;

const PENDING: u8 = 0;
const SETTLING: u8 = 1;
const RESOLVED: u8 = 2;
const REJECTED: u8 = 3;
const CANCELLED: u8 = 4;

/// Observable state of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Resolved,
    /// Settled with a terminal failure (exhausted or non-retryable).
    Rejected,
    /// Settled by cancellation.
    Cancelled,
}

impl Status {
    /// True for every state except `Pending`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Status::Pending)
    }
}

type Outcome<T> = Result<T, RetryError>;

/// Single-assignment result cell shared by a run and its handle.
pub(crate) struct Settle<T> {
    state: AtomicU8,
    slot: Mutex<Option<Outcome<T>>>,
    settled: Condvar,
    notify: Notify,
    token: CancellationToken,
}

impl<T> Settle<T> {
    pub(crate) fn new(token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(PENDING),
            slot: Mutex::new(None),
            settled: Condvar::new(),
            notify: Notify::new(),
            token,
        })
    }

    /// Settles with a value; `false` if the cell was already settled.
    pub(crate) fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value), RESOLVED)
    }

    /// Settles with a terminal failure; `false` if the cell was already settled.
    pub(crate) fn reject(&self, err: RetryError) -> bool {
        self.settle(Err(err), REJECTED)
    }

    /// Settles as cancelled and fires the run's token; `false` if already settled.
    pub(crate) fn cancel(&self) -> bool {
        let won = self.settle(Err(RetryError::Cancelled), CANCELLED);
        if won {
            self.token.cancel();
        }
        won
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn status(&self) -> Status {
        match self.state.load(Ordering::Acquire) {
            RESOLVED => Status::Resolved,
            REJECTED => Status::Rejected,
            CANCELLED => Status::Cancelled,
            _ => Status::Pending,
        }
    }

    /// True once the PENDING → SETTLING transition happened.
    pub(crate) fn is_claimed(&self) -> bool {
        self.state.load(Ordering::Acquire) != PENDING
    }

    fn settle(&self, outcome: Outcome<T>, terminal: u8) -> bool {
        if self
            .state
            .compare_exchange(PENDING, SETTLING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let mut slot = self.lock();
        *slot = Some(outcome);
        self.state.store(terminal, Ordering::Release);
        drop(slot);

        self.settled.notify_all();
        self.notify.notify_waiters();
        true
    }

    fn take(&self) -> Option<Outcome<T>> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Outcome<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_blocking(&self) -> Outcome<T> {
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            slot = self
                .settled
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    async fn wait_async(&self) -> Outcome<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.take() {
                return outcome;
            }
            notified.await;
        }
    }
}

/// Type-erased cancel side of a [`Settle`].
trait Cancel: Send + Sync {
    fn cancel(&self) -> bool;
    fn status(&self) -> Status;
}

impl<T: Send> Cancel for Settle<T> {
    fn cancel(&self) -> bool {
        Settle::cancel(self)
    }

    fn status(&self) -> Status {
        Settle::status(self)
    }
}

/// # Handle to the eventual outcome of a retry run.
///
/// Returned immediately by [`Retrier::submit`](crate::Retrier::submit); the run
/// proceeds in the background.
///
/// - [`get`](Self::get) blocks the calling thread until settlement;
/// - [`wait`](Self::wait) (or `.await`) suspends the calling task;
/// - [`try_get`](Self::try_get) and [`status`](Self::status) never block;
/// - [`cancel`](Self::cancel) settles the run as cancelled if it is still pending.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use retryvisor::{Config, RetryError, RetryPolicy, Retrier};
///
/// # #[tokio::main(flavor = "multi_thread")]
/// # async fn main() {
/// let retrier = Retrier::new(Config::default()).unwrap();
/// let policy = RetryPolicy::unbounded(retryvisor::BackoffPolicy::fixed(Duration::from_secs(1))).unwrap();
///
/// let handle = retrier.retry_blocking("never", policy, || Err::<(), _>("down"));
/// assert!(handle.cancel());
/// assert!(!handle.cancel());
/// assert!(matches!(handle.await, Err(RetryError::Cancelled)));
/// # }
/// ```
pub struct RetryHandle<T> {
    run: u64,
    shared: Arc<Settle<T>>,
}

impl<T: Send + 'static> RetryHandle<T> {
    pub(crate) fn new(run: u64, shared: Arc<Settle<T>>) -> Self {
        Self { run, shared }
    }

    /// Identifier of the run (matches [`Event::run`](crate::Event::run)).
    pub fn run_id(&self) -> u64 {
        self.run
    }

    /// Requests cancellation.
    ///
    /// Returns `true` if the run was still pending and is now settled as
    /// cancelled; `false` if it had already settled (no effect). An attempt in
    /// flight is not interrupted; its result is discarded.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// Current state; never blocks.
    pub fn status(&self) -> Status {
        self.shared.status()
    }

    pub fn is_settled(&self) -> bool {
        self.status().is_settled()
    }

    /// Cloneable handle that can only cancel and observe the run.
    pub fn canceller(&self) -> CancelHandle {
        CancelHandle {
            run: self.run,
            inner: Arc::clone(&self.shared) as Arc<dyn Cancel>,
        }
    }

    /// Blocks the current thread until the run settles.
    ///
    /// Must not be called from inside an async task driven by a
    /// current-thread runtime; use [`wait`](Self::wait) there.
    pub fn get(self) -> Result<T, RetryError> {
        self.shared.wait_blocking()
    }

    /// Suspends the current task until the run settles.
    pub async fn wait(self) -> Result<T, RetryError> {
        self.shared.wait_async().await
    }

    /// Returns the outcome if settled, otherwise gives the handle back.
    pub fn try_get(self) -> Result<Result<T, RetryError>, Self> {
        if !self.is_settled() {
            return Err(self);
        }
        match self.shared.take() {
            Some(outcome) => Ok(outcome),
            None => Err(self),
        }
    }
}

impl<T: Send + 'static> IntoFuture for RetryHandle<T> {
    type Output = Result<T, RetryError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl<T> std::fmt::Debug for RetryHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHandle")
            .field("run", &self.run)
            .field("status", &self.shared.status())
            .finish()
    }
}

/// # Cloneable cancel/observe side of a [`RetryHandle`].
///
/// Useful for deadline composition: hand a `CancelHandle` to a timer task and
/// keep the `RetryHandle` for the result.
#[derive(Clone)]
pub struct CancelHandle {
    run: u64,
    inner: Arc<dyn Cancel>,
}

impl CancelHandle {
    pub fn run_id(&self) -> u64 {
        self.run
    }

    /// Same contract as [`RetryHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    pub fn status(&self) -> Status {
        self.inner.status()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("run", &self.run)
            .field("status", &self.inner.status())
            .finish()
    }
}
