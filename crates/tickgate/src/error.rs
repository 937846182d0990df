//! Configuration errors for token sources and dispatchers.
//!
//! Every variant here is raised synchronously, before any background task is
//! spawned. Failures of individual work items never surface as an [`Error`];
//! they travel inside [`Outcome::result`](crate::Outcome) instead, and
//! cancellation is reported only as a shortfall in the number of outcomes.

use core::time::Duration;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All configuration errors `tickgate` can produce.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `submit` was called without an attached [`TokenSource`].
    ///
    /// [`TokenSource`]: crate::TokenSource
    #[error("rate limiter not set")]
    MissingRateLimiter,

    /// The token buffer cannot hold the requested number of intervals.
    #[error("intervals must be between 1 and {max}, got {intervals}")]
    InvalidIntervals { intervals: usize, max: usize },

    /// Splitting the time span yields a period the timer cannot represent.
    #[error("time span {time_span:?} split into {intervals} intervals yields a zero period")]
    InvalidPeriod {
        time_span: Duration,
        intervals: usize,
    },

    /// A dispatcher needs at least one worker.
    #[error("concurrency must be greater than 0")]
    InvalidConcurrency,

    /// The streaming seed queue needs room for at least one item.
    #[error("queue capacity must be greater than 0")]
    InvalidQueueCapacity,

    /// Background tasks can only be spawned from inside a Tokio runtime.
    #[error("no Tokio runtime is running on this thread")]
    NoRuntime,
}
