use crate::RunStats;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pushes every item from `items` into the work queue.
///
/// Both pulling the next item and pushing it race against `scope`; on
/// cancellation the remaining items are dropped without being reported.
/// Returning drops `queue`, which lets workers drain and exit.
pub(crate) async fn seed<T, S>(
    items: S,
    queue: mpsc::Sender<T>,
    scope: CancellationToken,
    stats: Arc<RunStats>,
) where
    S: Stream<Item = T>,
{
    let mut items = core::pin::pin!(items);

    loop {
        let item = tokio::select! {
            biased;
            () = scope.cancelled() => break,
            item = items.next() => match item {
                Some(item) => item,
                None => break,
            },
        };

        tokio::select! {
            biased;
            () = scope.cancelled() => break,
            sent = queue.send(item) => {
                if sent.is_err() {
                    // Every worker is gone.
                    break;
                }
                stats.record_seeded();
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(
        "Seeding finished ({} items, cancelled: {})",
        stats.snapshot().seeded,
        scope.is_cancelled()
    );
}
