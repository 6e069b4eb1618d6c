//! # Retryable operation abstraction.
//!
//! An [`Operation`] has a stable [`name`](Operation::name) and produces one fresh
//! attempt future per call to [`attempt`](Operation::attempt). The common handle
//! type is [`OperationRef`], an `Arc<dyn Operation<T>>` shared with the run.
//!
//! Operations are re-invoked as-is on every retry: they must tolerate being
//! executed more than once. No deduplication of side effects happens between
//! attempts.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Failure;

/// Boxed future of one attempt.
pub type BoxAttemptFuture<T> = Pin<Box<dyn Future<Output = Result<T, Failure>> + Send + 'static>>;

/// Shared handle to an operation.
pub type OperationRef<T> = Arc<dyn Operation<T>>;

/// # Fallible, re-invocable unit of work.
///
/// # Example
/// ```
/// use retryvisor::{BoxAttemptFuture, Failure, Operation};
///
/// struct Ping;
///
/// impl Operation<u16> for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     fn attempt(&self) -> BoxAttemptFuture<u16> {
///         Box::pin(async { Err(Failure::from_error("host unreachable")) })
///     }
/// }
/// ```
pub trait Operation<T>: Send + Sync + 'static {
    /// Returns a stable, human-readable operation name.
    fn name(&self) -> &str;

    /// Creates the future of a single attempt.
    fn attempt(&self) -> BoxAttemptFuture<T>;
}
