use crate::app::config::RunConfig;
use std::io::Write;
use tickgate::{Dispatcher, DispatcherConfig, FetchConfig, StatusFetch, TokenSource};
use tokio_util::sync::CancellationToken;

/// Tally of one run, as seen by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    /// URLs that produced no outcome, which only happens when the run was
    /// cancelled.
    pub fn missing(&self) -> usize {
        self.submitted - self.succeeded - self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.missing() == 0
    }
}

/// Fetches every configured URL and writes one line per outcome to `out`.
///
/// Cancelling `scope` stops the run early; whatever was already fetched is
/// still reported.
pub async fn run<W: Write>(
    config: RunConfig,
    scope: CancellationToken,
    out: &mut W,
) -> anyhow::Result<RunSummary> {
    let limiter = TokenSource::new(&scope, config.time_span, config.intervals)?;
    let fetch = StatusFetch::new(FetchConfig {
        timeout: config.fetch_timeout,
    })?;
    let mut dispatcher = Dispatcher::with_limiter(
        DispatcherConfig {
            concurrency: config.concurrency,
        },
        limiter,
        fetch,
    )?;

    let mut summary = RunSummary {
        submitted: config.urls.len(),
        ..RunSummary::default()
    };

    let mut results = dispatcher.submit(&scope, config.urls)?;
    while let Some(outcome) = results.recv().await {
        match &outcome.result {
            Ok(status) => {
                summary.succeeded += 1;
                writeln!(out, "ok  {} {}", outcome.item, status)?;
            }
            Err(e) => {
                summary.failed += 1;
                writeln!(out, "err {} {}", outcome.item, e)?;
            }
        }
    }

    #[cfg(feature = "tracing")]
    {
        let stats = results.stats();
        tracing::debug!(
            "Run finished: seeded {}, started {}, delivered {}, dropped {}",
            stats.seeded,
            stats.started,
            stats.delivered,
            stats.dropped
        );
    }

    Ok(summary)
}
