//! # retryvisor
//!
//! **Retryvisor** is a small asynchronous retry executor for Rust.
//!
//! It wraps a fallible operation (blocking closure or async closure), runs it
//! on a tokio runtime and re-invokes it after each failure according to a
//! [`RetryPolicy`]: how many attempts, how long to wait in between, which
//! failures are worth retrying and who gets told about each failure. The
//! caller gets a [`RetryHandle`] back immediately and may await it, block on
//! it or cancel it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   retry_blocking(f) / retry_async(f) / submit(op)
//!            │
//!            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Retrier                                                          │
//! │  - Bus (broadcast events)                                         │
//! │  - Semaphore (optional, global limit on attempts in flight)       │
//! │  - runtime token (parent of every run's token)                    │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ RetryRun │       │ RetryRun │       │ RetryRun │   one spawned task per run
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        │ settles          │                  │
//!        ▼                  ▼                  ▼
//!   RetryHandle        RetryHandle        RetryHandle     get() / await / cancel()
//!
//!   RetryRun ── Event ──► Bus ──► subscriber listener ──► SubscriberSet ──► Subscribe
//! ```
//!
//! ### Lifecycle
//! ```text
//! loop {
//!   ├─► cancelled? ─► RunCancelled, exit
//!   ├─► acquire semaphore (optional, cancellable)
//!   ├─► AttemptStarting{ run, attempt }
//!   ├─► attempt (spawn_blocking / await), panics become failures
//!   │       ├─ Ok  ──► resolve ─► RunSucceeded, exit
//!   │       └─ Err ──► AttemptFailed
//!   │                  ├─ on_failure(attempt, max, failure)
//!   │                  ├─ retry_if(failure) == false ─► RunRejected, exit
//!   │                  ├─ attempts used up           ─► RunExhausted, exit
//!   │                  └─ BackoffScheduled{ delay } ─► sleep (cancellable)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                            |
//! |-------------------|--------------------------------------------------------------|-----------------------------------------------|
//! | **Retrying**      | Start runs and collect their outcome.                        | [`Retrier`], [`RetryHandle`], [`CancelHandle`]|
//! | **Policies**      | Attempts, backoff, jitter, retry predicate, failure observer.| [`RetryPolicy`], [`BackoffPolicy`], [`JitterPolicy`] |
//! | **Operations**    | Wrap blocking or async closures.                             | [`Operation`], [`BlockingFn`], [`AsyncFn`]    |
//! | **Errors**        | Typed outcomes and configuration errors.                     | [`RetryError`], [`Failure`], [`PolicyError`]  |
//! | **Subscriber API**| Hook into run events (logging, metrics, custom).             | [`Subscribe`], [`LogWriter`]                  |
//! | **Configuration** | Centralize runtime settings.                                 | [`Config`]                                    |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use retryvisor::{Config, RetryError, RetryPolicy, Retrier};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let retrier = Retrier::new(Config::default())?;
//!
//!     let policy = RetryPolicy::builder()
//!         .with_max_attempts(3)
//!         .with_on_failure(|attempt, max, failure| {
//!             println!("{attempt} of {max}: {failure}");
//!         })
//!         .build()?;
//!
//!     let handle = retrier.retry_async("ping", policy, || async {
//!         Err::<(), _>("connection refused")
//!     });
//!
//!     match handle.await {
//!         Err(RetryError::Exhausted { attempts, last }) => {
//!             println!("gave up after {attempts} attempts: {last}");
//!         }
//!         other => println!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod ops;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use self::core::{CancelHandle, Config, Retrier, RetrierBuilder, RetryHandle, Status};
pub use error::{BoxError, Failure, FailureKind, PolicyError, RetryError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use ops::{AsyncFn, BlockingFn, BoxAttemptFuture, Operation, OperationRef};
pub use policies::{
    Backoff, BackoffPolicy, FailureObserver, JitterPolicy, MaxAttempts, RetryPolicy,
    RetryPolicyBuilder, RetryPredicate,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
