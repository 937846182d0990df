//! Rate-gated worker pool.
//!
//! A [`Dispatcher`] runs a fixed number of symmetric workers over a shared
//! item queue. Every work invocation needs both a free worker and a token
//! from the attached [`TokenSource`]: `concurrency` bounds parallelism, the
//! token source bounds throughput, and both apply at once.
//!
//! ## Run lifecycle
//!
//! 1. A seeding task fills the queue, racing every push against the scope.
//! 2. `concurrency` workers drain the queue (see `worker_loop`).
//! 3. A supervisory task waits for every worker, stops the token source and
//!    then closes the result stream.
//!
//! Per-item failures travel inside [`Outcome::result`]. The only errors
//! [`Dispatcher::submit`] returns are configuration errors, raised before any
//! task is spawned. Cancellation is never reported as an error; it shows up as
//! fewer outcomes than submitted items.

mod seed;
mod worker;

use crate::{Error, Outcome, Result, Results, RunStats, TokenSource, Work};
use futures::Stream;
use seed::seed;
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use worker::{WorkerContext, worker_loop};

/// Worker count used by [`DispatcherConfig::default`].
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome stream produced by running work `W` over items of type `T`.
pub type Outcomes<T, W> = Results<Outcome<T, <W as Work<T>>::Output, <W as Work<T>>::Error>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of workers, and so the maximum number of concurrent work
    /// invocations. Must be positive.
    pub concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Bounded-rate, bounded-parallelism executor for a [`Work`] function.
///
/// The dispatcher owns an attached [`TokenSource`] for exactly one run:
/// [`submit`](Self::submit) takes it, and the run stops it once every worker
/// has exited. Attach a fresh source before submitting again.
pub struct Dispatcher<W> {
    concurrency: usize,
    limiter: Option<TokenSource>,
    work: Arc<W>,
}

impl<W> core::fmt::Debug for Dispatcher<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("concurrency", &self.concurrency)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl<W> Dispatcher<W> {
    /// Creates a dispatcher with no rate limiter attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConcurrency`] if `config.concurrency` is zero.
    pub fn new(config: DispatcherConfig, work: W) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }
        Ok(Self {
            concurrency: config.concurrency,
            limiter: None,
            work: Arc::new(work),
        })
    }

    /// Creates a dispatcher around an already-scoped token source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConcurrency`] if `config.concurrency` is zero.
    pub fn with_limiter(config: DispatcherConfig, limiter: TokenSource, work: W) -> Result<Self> {
        let mut dispatcher = Self::new(config, work)?;
        dispatcher.limiter = Some(limiter);
        Ok(dispatcher)
    }

    /// Attaches `limiter`, returning the previously attached source (if any)
    /// untouched.
    pub fn set_rate_limiter(&mut self, limiter: TokenSource) -> Option<TokenSource> {
        self.limiter.replace(limiter)
    }

    /// Builder form of [`set_rate_limiter`](Self::set_rate_limiter).
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: TokenSource) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn has_rate_limiter(&self) -> bool {
        self.limiter.is_some()
    }

    /// Replaces the work function, keeping concurrency and limiter.
    pub fn with_work<V>(self, work: V) -> Dispatcher<V> {
        Dispatcher {
            concurrency: self.concurrency,
            limiter: self.limiter,
            work: Arc::new(work),
        }
    }

    pub fn work(&self) -> &W {
        &self.work
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `work` over every item and streams the outcomes back.
    ///
    /// The queue is sized to the item count, so seeding never waits on
    /// workers. Items not yet queued when `scope` is cancelled are dropped
    /// silently.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingRateLimiter`] if no token source is attached.
    /// - [`Error::NoRuntime`] if called outside a Tokio runtime.
    pub fn submit<T, I>(&mut self, scope: &CancellationToken, items: I) -> Result<Outcomes<T, W>>
    where
        W: Work<T>,
        T: Clone + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let (handle, limiter) = self.prepare()?;
        let items: Vec<T> = items.into_iter().collect();
        let capacity = items.len().max(1);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Dispatching {} items across {} workers",
            items.len(),
            self.concurrency
        );

        Ok(self.launch(
            &handle,
            scope,
            limiter,
            futures::stream::iter(items),
            capacity,
            capacity,
        ))
    }

    /// Like [`submit`](Self::submit), but pulls items lazily from a stream
    /// through a bounded queue of `queue_capacity` slots.
    ///
    /// Seeding waits whenever the queue is full, racing each push against
    /// `scope`. Use this when the items cannot be enumerated up front.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQueueCapacity`] if `queue_capacity` is zero.
    /// - [`Error::MissingRateLimiter`] if no token source is attached.
    /// - [`Error::NoRuntime`] if called outside a Tokio runtime.
    pub fn submit_stream<T, S>(
        &mut self,
        scope: &CancellationToken,
        items: S,
        queue_capacity: usize,
    ) -> Result<Outcomes<T, W>>
    where
        W: Work<T>,
        T: Clone + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        if queue_capacity == 0 {
            return Err(Error::InvalidQueueCapacity);
        }
        let (handle, limiter) = self.prepare()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Dispatching a stream across {} workers (queue capacity {})",
            self.concurrency,
            queue_capacity
        );

        let out_capacity = queue_capacity.max(self.concurrency);
        Ok(self.launch(&handle, scope, limiter, items, queue_capacity, out_capacity))
    }

    /// Validates the preconditions of a run and takes the limiter for it.
    fn prepare(&mut self) -> Result<(Handle, TokenSource)> {
        if self.limiter.is_none() {
            return Err(Error::MissingRateLimiter);
        }
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let limiter = self.limiter.take().ok_or(Error::MissingRateLimiter)?;
        Ok((handle, limiter))
    }

    fn launch<T, S>(
        &self,
        handle: &Handle,
        scope: &CancellationToken,
        limiter: TokenSource,
        items: S,
        queue_capacity: usize,
        out_capacity: usize,
    ) -> Outcomes<T, W>
    where
        W: Work<T>,
        T: Clone + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let stats = Arc::new(RunStats::default());
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity);
        let (out_tx, out_rx) = mpsc::channel(out_capacity);

        handle.spawn(seed(items, queue_tx, scope.clone(), Arc::clone(&stats)));

        let queue = Arc::new(Mutex::new(queue_rx));
        let workers = (0..self.concurrency)
            .map(|worker_id| {
                let ctx = WorkerContext {
                    queue: Arc::clone(&queue),
                    limiter: limiter.clone(),
                    work: Arc::clone(&self.work),
                    out: out_tx.clone(),
                    scope: scope.clone(),
                    stats: Arc::clone(&stats),
                };
                handle.spawn(worker_loop(worker_id, ctx))
            })
            .collect();

        handle.spawn(supervise(workers, out_tx, limiter));

        Results::new(ReceiverStream::new(out_rx), stats)
    }
}

/// Waits for every worker, then stops the token source and closes the result
/// stream. Runs once per submission, so each happens exactly once.
async fn supervise<O>(workers: Vec<JoinHandle<()>>, out: mpsc::Sender<O>, limiter: TokenSource) {
    for joined in futures::future::join_all(workers).await {
        if let Err(_e) = joined {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker task failed: {_e}");
        }
    }

    limiter.stop();
    // Workers dropped their senders on exit; this is the last one.
    drop(out);

    #[cfg(feature = "tracing")]
    tracing::debug!("Dispatch run complete");
}
