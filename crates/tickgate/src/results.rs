//! The caller's side of a run: a stream of outcomes plus live counters.

use core::{
    pin::Pin,
    task::{Context, Poll},
};
use futures::{Stream, StreamExt};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

/// Counters shared by the seeder and the workers of one run.
#[derive(Debug, Default)]
pub struct RunStats {
    seeded: AtomicUsize,
    started: AtomicUsize,
    delivered: AtomicUsize,
    dropped: AtomicUsize,
}

impl RunStats {
    pub(crate) fn record_seeded(&self) {
        self.seeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            seeded: self.seeded.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Items that made it into the work queue.
    pub seeded: usize,
    /// Items whose work function was invoked.
    pub started: usize,
    /// Outcomes handed to the result stream.
    pub delivered: usize,
    /// Outcomes produced but discarded because the run was cancelled or the
    /// stream was closed.
    pub dropped: usize,
}

/// Outcomes of one run, in completion order.
///
/// Single-pass: the stream ends once every worker has exited, and cannot be
/// restarted. Dropping it abandons delivery; outcomes produced afterwards are
/// counted as dropped.
#[derive(Debug)]
pub struct Results<O> {
    rx: ReceiverStream<O>,
    stats: Arc<RunStats>,
}

impl<O> Results<O> {
    pub(crate) fn new(rx: ReceiverStream<O>, stats: Arc<RunStats>) -> Self {
        Self { rx, stats }
    }

    /// Receives the next outcome, or `None` once the run has finished.
    pub async fn recv(&mut self) -> Option<O> {
        self.rx.next().await
    }

    /// Stops accepting outcomes while still allowing buffered ones to be
    /// received.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<O> Stream for Results<O> {
    type Item = O;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<O>> {
        Pin::new(&mut self.get_mut().rx).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rx.size_hint()
    }
}
