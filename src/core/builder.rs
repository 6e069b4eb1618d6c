use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::{runtime::Handle, sync::Semaphore};
use tokio_util::sync::CancellationToken;

use super::retrier::{LiveRuns, Retrier};
use crate::{
    core::Config,
    error::RuntimeError,
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Retrier`] with optional features.
pub struct RetrierBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    runtime: Option<Handle>,
}

impl RetrierBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            runtime: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive run events (attempts, backoffs, outcomes) through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runs everything on the given runtime instead of the current one.
    ///
    /// Required when building outside of a tokio context, e.g. from a plain
    /// thread that later calls the blocking [`RetryHandle::get`](crate::RetryHandle::get).
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the retrier.
    ///
    /// Initializes the event bus, the optional global semaphore and, when
    /// subscribers were given, the subscriber workers plus the bus listener.
    pub fn build(self) -> Result<Retrier, RuntimeError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| RuntimeError::NoRuntime {
                reason: e.to_string(),
            })?,
        };

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let semaphore = self
            .cfg
            .concurrency_limit()
            .map(Semaphore::new)
            .map(Arc::new);
        let runtime_token = CancellationToken::new();
        let live = Arc::new(LiveRuns::default());

        if !self.subscribers.is_empty() {
            let subs = SubscriberSet::new(self.subscribers, bus.clone(), &runtime);
            subscriber_listener(
                &runtime,
                &bus,
                subs,
                runtime_token.clone(),
                Arc::clone(&live),
            );
        }

        Ok(Retrier::new_internal(
            self.cfg,
            bus,
            runtime,
            semaphore,
            runtime_token,
            live,
        ))
    }
}

/// Subscribes to the bus and forwards events to the subscriber set until shutdown.
///
/// After shutdown it keeps forwarding until every live run task has finished,
/// so the runs' final `RunCancelled` events are delivered too.
fn subscriber_listener(
    runtime: &Handle,
    bus: &Bus,
    subs: SubscriberSet,
    runtime_token: CancellationToken,
    live: Arc<LiveRuns>,
) {
    let mut rx = bus.subscribe();
    runtime.spawn(async move {
        let open = tokio::select! {
            open = forward(&mut rx, &subs) => open,
            _ = runtime_token.cancelled() => true,
        };
        if open {
            tokio::select! {
                biased;
                _ = forward(&mut rx, &subs) => {}
                _ = live.idle() => {}
            }
        }
        // Flush what is already queued before stopping the workers.
        while let Ok(ev) = rx.try_recv() {
            subs.emit(&ev);
        }
        subs.shutdown().await;
    });
}

/// Forwards bus events until the bus closes; returns `false` once it has.
async fn forward(rx: &mut broadcast::Receiver<Event>, subs: &SubscriberSet) -> bool {
    loop {
        match rx.recv().await {
            Ok(ev) => subs.emit(&ev),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "subscriber listener lagged behind the bus");
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
