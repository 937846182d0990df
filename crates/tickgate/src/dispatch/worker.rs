use crate::{Outcome, RunStats, TokenSource, Work};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Everything one worker shares with its siblings.
pub(crate) struct WorkerContext<T, W: Work<T>> {
    pub queue: Arc<Mutex<mpsc::Receiver<T>>>,
    pub limiter: TokenSource,
    pub work: Arc<W>,
    pub out: mpsc::Sender<Outcome<T, W::Output, W::Error>>,
    pub scope: CancellationToken,
    pub stats: Arc<RunStats>,
}

/// Runs one worker until the queue is exhausted or the run is cancelled.
///
/// For each item: take it from the shared queue, wait for a token, invoke the
/// work function, then hand the outcome to the result stream. Waiting for an
/// item, waiting for a token, and delivering the outcome all give way to
/// cancellation; the work invocation itself is never interrupted, but its
/// outcome is discarded if the scope was cancelled while it ran.
pub(crate) async fn worker_loop<T, W>(_worker_id: usize, ctx: WorkerContext<T, W>)
where
    T: Clone + Send + Sync + 'static,
    W: Work<T>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {} started", _worker_id);

    let WorkerContext {
        queue,
        limiter,
        work,
        out,
        scope,
        stats,
    } = ctx;

    loop {
        let next = tokio::select! {
            biased;
            () = scope.cancelled() => None,
            item = async { queue.lock().await.recv().await } => item,
        };
        let Some(item) = next else { break };

        if out.is_closed() {
            // The caller dropped the result stream; nothing left to run for.
            break;
        }

        if !limiter.acquire(&scope).await {
            #[cfg(feature = "tracing")]
            tracing::trace!("Worker {} gave up waiting for a token", _worker_id);
            break;
        }

        stats.record_started();
        let result = work.run(scope.clone(), item.clone()).await;

        // Cancellation only ever shows up as a missing outcome.
        if scope.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {} dropped an outcome on cancellation", _worker_id);
            stats.record_dropped();
            break;
        }

        let outcome = Outcome::new(item, result);
        tokio::select! {
            biased;
            () = scope.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Worker {} dropped an outcome on cancellation", _worker_id);
                stats.record_dropped();
                break;
            }
            sent = out.send(outcome) => {
                if sent.is_err() {
                    // The caller dropped the result stream.
                    stats.record_dropped();
                    break;
                }
                stats.record_delivered();
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {} stopped", _worker_id);
}
