//! # Async function-backed operation (`AsyncFn`)
//!
//! [`AsyncFn`] wraps a closure `F: Fn() -> Fut`, producing a fresh future per
//! attempt. There is no hidden state shared between attempts; if one is needed,
//! capture an `Arc<...>` explicitly inside the closure.
//!
//! ## Example
//! ```rust
//! use retryvisor::{AsyncFn, OperationRef};
//!
//! let op: OperationRef<&'static str> =
//!     AsyncFn::arc("hello", || async { Ok::<_, std::io::Error>("hi") });
//! assert_eq!(op.name(), "hello");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, Failure};
use crate::ops::operation::{BoxAttemptFuture, Operation};

/// Function-backed async operation.
#[derive(Debug)]
pub struct AsyncFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> AsyncFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut, T, E> Operation<T> for AsyncFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt(&self) -> BoxAttemptFuture<T> {
        let fut = (self.f)();
        Box::pin(async move { fut.await.map_err(Failure::from_error) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maps_errors_into_failures() {
        let op = AsyncFn::new("refused", || async {
            Err::<u8, _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ))
        });
        let failure = op.attempt().await.unwrap_err();
        let io = failure.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
    }
}
