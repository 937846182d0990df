//! Fixed-cadence token generation for throughput shaping.
//!
//! A [`TokenSource`] owns one background Tokio task that adds a token to a
//! bounded buffer every `time_span / intervals`. The buffer holds at most
//! `intervals` tokens, so an idle period can never build up more than one
//! `time_span` worth of burst.
//!
//! The buffer is a [`Semaphore`]: a token is a permit, consuming one forgets
//! the permit. Many tasks may wait on the same source; the semaphore hands
//! each token to exactly one of them.
//!
//! ## Lifecycle
//!
//! `Running → Stopped`, triggered by [`TokenSource::stop`], by cancelling the
//! scope the source was created with, or by dropping every handle. Once
//! stopped, the buffer is closed and no waiter can obtain another token, even
//! one that was issued before the stop.

use crate::{Error, Result};
use core::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use futures::Stream;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::{
    runtime::Handle,
    sync::Semaphore,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::{CancellationToken, PollSemaphore};

/// A cloneable handle to a rate-limiting token buffer.
///
/// Clones share the same buffer and background task.
#[derive(Clone, Debug)]
pub struct TokenSource {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tokens: Arc<Semaphore>,
    capacity: usize,
    period: Duration,
    halt: CancellationToken,
    stopped: AtomicBool,
}

impl Inner {
    /// Adds one token unless the buffer is full or the source has stopped.
    ///
    /// Only the ticking task calls this, so the capacity check cannot race
    /// with another producer.
    fn issue(&self) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        if self.tokens.available_permits() < self.capacity {
            self.tokens.add_permits(1);
        }
    }

    /// Transitions to `Stopped`. Returns `true` only for the call that
    /// performed the transition.
    fn shut(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tokens.close();
        self.halt.cancel();
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.halt.cancel();
    }
}

impl TokenSource {
    /// Creates a source issuing `intervals` tokens per `time_span`, bound to
    /// `scope`.
    ///
    /// The first token is issued one period after creation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIntervals`] if `intervals` is zero or larger than the
    ///   token buffer supports.
    /// - [`Error::InvalidPeriod`] if `time_span / intervals` is zero.
    /// - [`Error::NoRuntime`] if called outside a Tokio runtime.
    pub fn new(scope: &CancellationToken, time_span: Duration, intervals: usize) -> Result<Self> {
        let period = period_for(time_span, intervals)?;
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let inner = Arc::new(Inner {
            tokens: Arc::new(Semaphore::new(0)),
            capacity: intervals,
            period,
            halt: scope.child_token(),
            stopped: AtomicBool::new(false),
        });

        handle.spawn(tick(Arc::downgrade(&inner), inner.halt.clone(), period));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Token source started: {} tokens per {:?} (period {:?})",
            intervals,
            time_span,
            period
        );

        Ok(Self { inner })
    }

    /// Waits for one token.
    ///
    /// Returns `true` once a token has been consumed, or `false` if `scope`
    /// is cancelled or the source stops first. Each token is handed to
    /// exactly one caller.
    pub async fn acquire(&self, scope: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = scope.cancelled() => false,
            () = self.inner.halt.cancelled() => false,
            permit = self.inner.tokens.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    true
                }
                Err(_closed) => false,
            },
        }
    }

    /// Consumes a token if one is buffered right now.
    pub fn try_acquire(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        match self.inner.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Exposes the token buffer as a [`Stream`] for use inside a caller's own
    /// `tokio::select!`.
    ///
    /// This is racier than [`acquire`](Self::acquire): several listeners
    /// compete for the same token and whichever is polled first wins. The
    /// stream ends once the source stops.
    pub fn raw(&self) -> RawTokens {
        RawTokens {
            tokens: PollSemaphore::new(Arc::clone(&self.inner.tokens)),
        }
    }

    /// Stops the background task and closes the buffer.
    ///
    /// Safe to call any number of times, from any number of tasks.
    pub fn stop(&self) {
        if self.inner.shut() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Token source stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire) || self.inner.halt.is_cancelled()
    }

    /// Number of tokens currently buffered.
    pub fn available(&self) -> usize {
        if self.is_stopped() {
            0
        } else {
            self.inner.tokens.available_permits()
        }
    }

    /// Maximum number of buffered tokens, equal to `intervals`.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Time between two issued tokens.
    pub fn period(&self) -> Duration {
        self.inner.period
    }
}

/// Token buffer viewed as a stream; see [`TokenSource::raw`].
#[derive(Clone, Debug)]
pub struct RawTokens {
    tokens: PollSemaphore,
}

impl Stream for RawTokens {
    type Item = ();

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.get_mut().tokens.poll_acquire(cx).map(|permit| {
            permit.map(|permit| {
                permit.forget();
            })
        })
    }
}

fn period_for(time_span: Duration, intervals: usize) -> Result<Duration> {
    let max = Semaphore::MAX_PERMITS.min(u32::MAX as usize);
    let divisor = match u32::try_from(intervals) {
        Ok(n) if n > 0 && intervals <= max => n,
        _ => return Err(Error::InvalidIntervals { intervals, max }),
    };

    let period = time_span / divisor;
    if period.is_zero() {
        return Err(Error::InvalidPeriod {
            time_span,
            intervals,
        });
    }
    Ok(period)
}

async fn tick(inner: Weak<Inner>, halt: CancellationToken, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    // Late ticks push the schedule back instead of bursting to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = halt.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.issue();
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        if inner.shut() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Token source stopped by scope cancellation");
        }
    }
}

#[cfg(test)]
mod tests;
