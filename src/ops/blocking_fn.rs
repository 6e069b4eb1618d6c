//! # Blocking function-backed operation (`BlockingFn`)
//!
//! [`BlockingFn`] wraps a synchronous closure `F: Fn() -> Result<T, E>` (a JDBC-style
//! connect, an SMTP send, a file lock) and runs each attempt on tokio's blocking
//! pool via [`spawn_blocking`](tokio::task::spawn_blocking). The async scheduling
//! loop never executes the closure itself.
//!
//! A panic inside the closure surfaces as a [`Failure`] of kind
//! [`Panic`](crate::FailureKind::Panic) rather than unwinding into the runtime.
//!
//! ## Example
//! ```rust
//! use retryvisor::{BlockingFn, OperationRef};
//!
//! let op: OperationRef<u32> = BlockingFn::arc("answer", || Ok::<_, std::io::Error>(42));
//! assert_eq!(op.name(), "answer");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{BoxError, Failure};
use crate::ops::operation::{BoxAttemptFuture, Operation};

/// Operation running a blocking closure on the blocking pool.
pub struct BlockingFn<F> {
    name: Cow<'static, str>,
    f: Arc<F>,
}

impl<F> BlockingFn<F> {
    /// Creates a new blocking operation.
    ///
    /// Prefer [`BlockingFn::arc`] when you immediately need an [`OperationRef`](crate::OperationRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, T, E> Operation<T> for BlockingFn<F>
where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self) -> BoxAttemptFuture<T> {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f()).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(Failure::from_error(err)),
                Err(join) if join.is_panic() => Err(Failure::from_panic(join.into_panic())),
                Err(join) => Err(Failure::from_error(join)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn runs_closure_once_per_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let op = BlockingFn::new("count", move || {
            Ok::<_, std::io::Error>(calls_in.fetch_add(1, Ordering::SeqCst) + 1)
        });

        assert_eq!(op.attempt().await.unwrap(), 1);
        assert_eq!(op.attempt().await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn converts_errors_and_panics() {
        let failing = BlockingFn::new("fail", || Err::<(), _>("no alive smtp servers"));
        let failure = failing.attempt().await.unwrap_err();
        assert!(!failure.is_panic());
        assert_eq!(failure.message(), "no alive smtp servers");

        let panicking = BlockingFn::new("panic", || -> Result<(), std::io::Error> {
            panic!("driver crashed")
        });
        let failure = panicking.attempt().await.unwrap_err();
        assert!(failure.is_panic());
        assert_eq!(failure.message(), "driver crashed");
    }
}
