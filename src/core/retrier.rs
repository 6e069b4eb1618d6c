//! # Retrier: starts retry runs and owns the shared runtime pieces.
//!
//! The [`Retrier`] owns the event bus, the optional global concurrency
//! semaphore and a parent cancellation token. Each submitted operation becomes
//! one [`RetryRun`] spawned on the runtime; the caller gets a [`RetryHandle`]
//! back immediately.
//!
//! ## High-level architecture
//! ```text
//! submit(op, policy)
//!   ├─► run id = RUN_SEQ++
//!   ├─► Settle cell + child token (runtime_token.child_token())
//!   ├─► runtime.spawn(RetryRun::drive())          (never blocks the caller)
//!   └─► RetryHandle ──► caller: get() / wait() / cancel()
//!
//! RetryRun::drive()
//!   loop {
//!     ├─► [semaphore permit]
//!     ├─► executor::run_attempt() ─► BlockingFn: spawn_blocking(f)
//!     │                             AsyncFn:    f().await
//!     ├─► Ok  ─► resolve ─► RunSucceeded
//!     └─► Err ─► on_failure() ─► retry_if? ─► attempts left?
//!                  ├─ no  ─► reject ─► RunRejected / RunExhausted
//!                  └─ yes ─► BackoffScheduled ─► sleep(next_delay) (cancellable)
//!   }
//!
//! Event flow:
//!   RetryRun ── publish(Event) ──► Bus ──► listener ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use retryvisor::{Config, RetryPolicy, Retrier};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let retrier = Retrier::new(Config::default())?;
//!     let policy = RetryPolicy::fixed(3, Duration::from_millis(10))?;
//!
//!     let handle = retrier.retry_blocking("read-config", policy, || {
//!         std::fs::read_to_string("/etc/hostname")
//!     });
//!     let _ = handle.await;
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::{
    runtime::Handle,
    sync::{Notify, Semaphore, broadcast},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::builder::RetrierBuilder;
use crate::{
    core::{
        config::Config,
        handle::{RetryHandle, Settle},
        scheduler::RetryRun,
    },
    error::{BoxError, RuntimeError, panic_message},
    events::{Bus, Event},
    ops::{AsyncFn, BlockingFn, OperationRef},
    policies::RetryPolicy,
};

/// Global run id counter.
static RUN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Entry point: spawns retry runs and hands out their result handles.
pub struct Retrier {
    cfg: Config,
    bus: Bus,
    runtime: Handle,
    semaphore: Option<Arc<Semaphore>>,
    runtime_token: CancellationToken,
    live: Arc<LiveRuns>,
}

impl Retrier {
    /// Creates a retrier on the current tokio runtime, without subscribers.
    pub fn new(cfg: Config) -> Result<Self, RuntimeError> {
        RetrierBuilder::new(cfg).build()
    }

    /// Starts a builder (subscribers, explicit runtime).
    pub fn builder(cfg: Config) -> RetrierBuilder {
        RetrierBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        runtime: Handle,
        semaphore: Option<Arc<Semaphore>>,
        runtime_token: CancellationToken,
        live: Arc<LiveRuns>,
    ) -> Self {
        Self {
            cfg,
            bus,
            runtime,
            semaphore,
            runtime_token,
            live,
        }
    }

    /// Starts a run of `op` under `policy` and returns its handle immediately.
    pub fn submit<T>(
        &self,
        op: OperationRef<T>,
        policy: impl Into<Arc<RetryPolicy>>,
    ) -> RetryHandle<T>
    where
        T: Send + 'static,
    {
        let id = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        let settle = Settle::new(self.runtime_token.child_token());
        let run = RetryRun {
            id,
            op,
            policy: policy.into(),
            settle: Arc::clone(&settle),
            bus: self.bus.clone(),
            semaphore: self.semaphore.clone(),
        };

        self.live.enter();
        let guard = CancelOnDrop {
            run: id,
            settle: Arc::clone(&settle),
            live: Arc::clone(&self.live),
        };
        self.runtime.spawn(async move {
            let _guard = guard;
            if let Err(payload) = AssertUnwindSafe(run.drive()).catch_unwind().await {
                // Only a broken Backoff implementation can get here.
                error!(run = id, info = %panic_message(payload.as_ref()), "retry run panicked");
            }
        });

        RetryHandle::new(id, settle)
    }

    /// Starts a run using [`Config::policy`].
    pub fn submit_with_defaults<T>(&self, op: OperationRef<T>) -> RetryHandle<T>
    where
        T: Send + 'static,
    {
        self.submit(op, self.cfg.policy.clone())
    }

    /// Retries a blocking closure; each attempt runs on the blocking pool.
    ///
    /// The closure is re-invoked on every retry and must tolerate that.
    pub fn retry_blocking<F, T, E>(
        &self,
        name: impl Into<Cow<'static, str>>,
        policy: impl Into<Arc<RetryPolicy>>,
        f: F,
    ) -> RetryHandle<T>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let op: OperationRef<T> = BlockingFn::arc(name, f);
        self.submit(op, policy)
    }

    /// Retries an async closure; a fresh future is created per attempt.
    pub fn retry_async<F, Fut, T, E>(
        &self,
        name: impl Into<Cow<'static, str>>,
        policy: impl Into<Arc<RetryPolicy>>,
        f: F,
    ) -> RetryHandle<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        let op: OperationRef<T> = AsyncFn::arc(name, f);
        self.submit(op, policy)
    }

    /// Creates a raw receiver of every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Cancels every live run; each settles as [`Cancelled`](crate::RetryError::Cancelled).
    ///
    /// Runs submitted afterwards are cancelled before their first attempt.
    pub fn shutdown(&self) {
        self.runtime_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

/// Settles a run as cancelled if its task ends without settling it.
///
/// Covers a panicking run and a task dropped by a runtime that was shut down
/// while the run was still pending; waiters in `get()` must never hang.
struct CancelOnDrop<T> {
    run: u64,
    settle: Arc<Settle<T>>,
    live: Arc<LiveRuns>,
}

impl<T> Drop for CancelOnDrop<T> {
    fn drop(&mut self) {
        if self.settle.cancel() {
            warn!(run = self.run, "retry run dropped before settling; cancelled");
        }
        self.live.exit();
    }
}

/// Number of spawned runs whose task has not finished yet.
///
/// The subscriber listener waits on it after shutdown so the `RunCancelled`
/// events of the last runs still reach subscribers.
#[derive(Debug, Default)]
pub(crate) struct LiveRuns {
    count: AtomicUsize,
    idle: Notify,
}

impl LiveRuns {
    fn enter(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn exit(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolves once no run task is alive.
    pub(crate) async fn idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BackoffPolicy, EventKind, Failure, RetryError, Status, Subscribe,
        policies::MaxAttempts,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::sync::{Mutex, mpsc};
    use std::time::{Duration, Instant};

    #[derive(Debug, thiserror::Error)]
    #[error("validation failed: {0}")]
    struct Invalid(&'static str);

    fn counter() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        let c = Arc::new(AtomicU32::new(0));
        (Arc::clone(&c), c)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn succeeds_on_third_attempt_after_two_delays() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let policy = RetryPolicy::fixed(3, Duration::from_millis(10)).unwrap();
        let (calls, calls_in) = counter();

        let started = Instant::now();
        let handle = retrier.retry_blocking("flaky", policy, move || {
            let n = calls_in.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 { Err(format!("boom #{n}")) } else { Ok(n) }
        });

        assert_eq!(handle.await.unwrap(), 3);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exhausts_with_last_failure() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let (calls, calls_in) = counter();
        let (observed, observed_in) = counter();
        let policy = RetryPolicy::builder()
            .with_backoff(BackoffPolicy::fixed(Duration::from_millis(10)))
            .with_max_attempts(10)
            .with_on_failure(move |attempt, max, failure| {
                assert_eq!(max, MaxAttempts::limited(10).unwrap());
                assert_eq!(failure.message(), format!("send #{attempt} failed"));
                observed_in.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let started = Instant::now();
        let handle = retrier.retry_blocking("smtp", policy, move || {
            let n = calls_in.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(format!("send #{n} failed"))
        });

        match handle.await {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 10);
                assert_eq!(last.message(), "send #10 failed");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(90));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(observed.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn non_retryable_failure_stops_after_one_attempt() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let (calls, calls_in) = counter();
        let (observed, observed_in) = counter();
        let policy = RetryPolicy::builder()
            .with_max_attempts(5)
            .with_retry_if(|f: &Failure| f.downcast_ref::<Invalid>().is_none())
            .with_on_failure(move |_, _, _| {
                observed_in.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let handle = retrier.retry_blocking("validate", policy, move || {
            calls_in.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Invalid("missing recipient"))
        });

        let err = handle.await.unwrap_err();
        assert!(matches!(err, RetryError::Rejected { attempt: 1, .. }));
        assert!(err.failure().unwrap().downcast_ref::<Invalid>().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The observer still sees the terminal failure.
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unbounded_run_cancelled_after_first_failure() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let (calls, calls_in) = counter();
        let (failed_tx, failed_rx) = mpsc::channel::<u32>();
        let failed_tx = Mutex::new(failed_tx);
        let policy = RetryPolicy::builder()
            .with_backoff(BackoffPolicy::fixed(Duration::from_secs(30)))
            .with_unbounded_attempts()
            .with_on_failure(move |attempt, _, _| {
                let _ = failed_tx.lock().unwrap().send(attempt);
            })
            .build()
            .unwrap();

        let handle = retrier.retry_blocking("db-connect", policy, move || {
            calls_in.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("No alive DB found")
        });

        let first = tokio::task::spawn_blocking(move || failed_rx.recv().unwrap())
            .await
            .unwrap();
        assert_eq!(first, 1);
        assert!(handle.cancel());
        assert!(!handle.cancel());

        assert_eq!(handle.status(), Status::Cancelled);
        assert!(handle.await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn in_flight_result_is_discarded_after_cancel() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let mut events = retrier.subscribe();
        let (calls, calls_in) = counter();
        let (observed, observed_in) = counter();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let gate = Mutex::new((started_tx, release_rx));
        let policy = RetryPolicy::builder()
            .with_max_attempts(5)
            .with_on_failure(move |_, _, _| {
                observed_in.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let handle = retrier.retry_blocking("slow", policy, move || {
            calls_in.fetch_add(1, Ordering::SeqCst);
            let gate = gate.lock().unwrap();
            let _ = gate.0.send(());
            let _ = gate.1.recv();
            Err::<(), _>("too late")
        });

        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();
        assert!(handle.cancel());
        release_tx.send(()).unwrap();

        let mut kinds = Vec::new();
        while let Ok(Ok(ev)) =
            tokio::time::timeout(Duration::from_secs(2), events.recv()).await
        {
            kinds.push(ev.kind);
            if ev.is_terminal() {
                break;
            }
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::AttemptStarting,
                EventKind::AttemptFailed,
                EventKind::ResultDiscarded,
                EventKind::RunCancelled,
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn publishes_ordered_events_for_a_retry() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let mut events = retrier.subscribe();
        let (_, calls_in) = counter();
        let policy = RetryPolicy::fixed(2, Duration::ZERO).unwrap();

        let handle = retrier.retry_async("ping", policy, move || {
            let n = calls_in.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err("refused") } else { Ok(n) } }
        });
        let run = handle.run_id();
        assert_eq!(handle.await.unwrap(), 1);

        let mut seen = Vec::new();
        loop {
            let ev = events.recv().await.unwrap();
            assert_eq!(ev.run, Some(run));
            assert_eq!(ev.name.as_deref(), Some("ping"));
            seen.push((ev.kind, ev.attempt));
            if ev.is_terminal() {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                (EventKind::AttemptStarting, Some(1)),
                (EventKind::AttemptFailed, Some(1)),
                (EventKind::BackoffScheduled, Some(1)),
                (EventKind::AttemptStarting, Some(2)),
                (EventKind::AttemptSucceeded, Some(2)),
                (EventKind::RunSucceeded, Some(2)),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn observer_panic_does_not_abort_the_run() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let (calls, calls_in) = counter();
        let policy = RetryPolicy::builder()
            .with_max_attempts(3)
            .with_on_failure(|_, _, _| panic!("observer bug"))
            .build()
            .unwrap();

        let handle = retrier.retry_blocking("noisy", policy, move || {
            calls_in.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("still down")
        });

        let err = handle.await.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_operation_is_retried() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let (calls, calls_in) = counter();
        let policy = RetryPolicy::fixed(2, Duration::from_millis(1)).unwrap();

        let handle = retrier.retry_blocking("crashy", policy, move || -> Result<u8, BoxError> {
            if calls_in.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("driver crashed");
            }
            Ok(1)
        });

        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn global_limit_serializes_attempts() {
        let cfg = Config {
            max_concurrent: 1,
            ..Config::default()
        };
        let retrier = Retrier::new(cfg).unwrap();
        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                retrier.retry_blocking(format!("job-{i}"), RetryPolicy::default(), move || {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(i)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i);
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_cancels_live_runs() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let policy = RetryPolicy::unbounded(BackoffPolicy::fixed(Duration::from_secs(30))).unwrap();
        let handle = retrier.retry_blocking("forever", policy, || Err::<(), _>("down"));
        let canceller = handle.canceller();

        tokio::time::sleep(Duration::from_millis(20)).await;
        retrier.shutdown();
        assert!(retrier.is_shutdown());

        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(canceller.status(), Status::Cancelled);
        assert!(!canceller.cancel());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn subscribers_receive_run_events() {
        struct Terminal(Mutex<Vec<EventKind>>);

        #[async_trait]
        impl Subscribe for Terminal {
            async fn on_event(&self, ev: &Event) {
                if ev.is_terminal() {
                    self.0.lock().unwrap().push(ev.kind);
                }
            }
        }

        let terminal = Arc::new(Terminal(Mutex::new(Vec::new())));
        let subscribers: Vec<Arc<dyn Subscribe>> =
            vec![terminal.clone(), Arc::new(crate::LogWriter::new())];
        let retrier = Retrier::builder(Config::default())
            .with_subscribers(subscribers)
            .build()
            .unwrap();

        let ok = retrier.retry_async("ok", RetryPolicy::default(), || async {
            Ok::<_, BoxError>(())
        });
        ok.await.unwrap();

        for _ in 0..100 {
            if !terminal.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*terminal.0.lock().unwrap(), vec![EventKind::RunSucceeded]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn subscribers_see_cancellations_caused_by_shutdown() {
        #[derive(Default)]
        struct CancelCounter(AtomicU32);

        #[async_trait]
        impl Subscribe for CancelCounter {
            async fn on_event(&self, ev: &Event) {
                if ev.kind == EventKind::RunCancelled {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let counter = Arc::new(CancelCounter::default());
        let subscribers: Vec<Arc<dyn Subscribe>> = vec![counter.clone()];
        let retrier = Retrier::builder(Config::default())
            .with_subscribers(subscribers)
            .build()
            .unwrap();
        let policy = RetryPolicy::unbounded(BackoffPolicy::fixed(Duration::from_secs(30))).unwrap();
        let handles: Vec<_> = (0..3)
            .map(|i| retrier.retry_blocking(format!("idle-{i}"), policy.clone(), || Err::<(), _>("down")))
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        retrier.shutdown();
        for handle in handles {
            assert!(handle.await.unwrap_err().is_cancelled());
        }

        for _ in 0..200 {
            if counter.0.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn blocking_get_from_a_plain_thread() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let retrier = Retrier::builder(Config::default())
            .with_runtime(rt.handle().clone())
            .build()
            .unwrap();
        let urls = ["jdbc:mysql:foo", "jdbc:oracle:bar", "jdbc:h2:mem:myDb"];
        let (calls, calls_in) = counter();
        let policy = RetryPolicy::unbounded(BackoffPolicy::fixed(Duration::from_millis(5))).unwrap();

        let handle = retrier.retry_blocking("connect", policy, move || {
            let round = calls_in.fetch_add(1, Ordering::SeqCst);
            urls.iter()
                .find(|url| url.contains("h2") && round >= 2)
                .map(|url| url.to_string())
                .ok_or("No alive DB found")
        });

        assert_eq!(handle.get().unwrap(), "jdbc:h2:mem:myDb");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropped_runtime_cancels_pending_runs() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let retrier = Retrier::builder(Config::default())
            .with_runtime(rt.handle().clone())
            .build()
            .unwrap();
        let policy = RetryPolicy::unbounded(BackoffPolicy::fixed(Duration::from_secs(30))).unwrap();
        let handle = retrier.retry_blocking("stuck", policy, || Err::<(), _>("down"));

        std::thread::sleep(Duration::from_millis(20));
        rt.shutdown_timeout(Duration::from_millis(100));

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(handle.get());
        });
        let outcome = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("get() must return once the runtime is gone");
        assert!(outcome.unwrap_err().is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_from_observer_arms_no_backoff() {
        let retrier = Retrier::new(Config::default()).unwrap();
        let mut events = retrier.subscribe();
        let canceller: Arc<std::sync::OnceLock<crate::CancelHandle>> = Arc::default();
        let from_observer = Arc::clone(&canceller);
        let ready = Arc::clone(&canceller);
        let policy = RetryPolicy::builder()
            .with_backoff(BackoffPolicy::fixed(Duration::from_millis(50)))
            .with_unbounded_attempts()
            .with_on_failure(move |_, _, _| {
                if let Some(c) = from_observer.get() {
                    c.cancel();
                }
            })
            .build()
            .unwrap();

        let handle = retrier.retry_async("db-connect", policy, move || {
            let ready = Arc::clone(&ready);
            async move {
                while ready.get().is_none() {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err::<(), _>("No alive DB found")
            }
        });
        let run = handle.run_id();
        let _ = canceller.set(handle.canceller());

        assert!(handle.await.unwrap_err().is_cancelled());
        let mut kinds = Vec::new();
        loop {
            let ev = events.recv().await.unwrap();
            if ev.run != Some(run) {
                continue;
            }
            kinds.push(ev.kind);
            if ev.is_terminal() {
                break;
            }
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::AttemptStarting,
                EventKind::AttemptFailed,
                EventKind::RunCancelled,
            ]
        );
    }

    #[test]
    fn build_without_runtime_fails() {
        let err = Retrier::new(Config::default()).err().unwrap();
        assert_eq!(err.as_label(), "runtime_missing");
    }

    #[tokio::test]
    async fn submit_with_defaults_uses_config_policy() {
        let cfg = Config {
            policy: RetryPolicy::fixed(4, Duration::ZERO).unwrap(),
            ..Config::default()
        };
        let retrier = Retrier::new(cfg).unwrap();
        let (calls, calls_in) = counter();
        let op: OperationRef<()> = AsyncFn::arc("defaults", move || {
            calls_in.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("nope") }
        });

        let err = retrier.submit_with_defaults(op).await.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 4, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(retrier.config().policy.max_attempts().get(), Some(4));
    }
}
