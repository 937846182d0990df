//! The unit of work applied to each dispatched item.
//!
//! The pool knows nothing about what the work does. It only decides when a
//! [`Work`] runs (after a token is acquired) and how many run at once (one per
//! worker). Any state a work function carries is shared by every worker and
//! must be safe to use concurrently.
//!
//! Closures are work functions:
//!
//! ```rust
//! use tickgate::Work;
//! use tokio_util::sync::CancellationToken;
//!
//! fn assert_work<W: Work<u32>>(_: &W) {}
//!
//! let double = |_scope: CancellationToken, n: u32| async move { Ok::<_, String>(n * 2) };
//! assert_work(&double);
//! ```

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::*;

use tokio_util::sync::CancellationToken;

/// A capability invoked once per dispatched item.
///
/// `scope` is the cancellation scope of the whole run. Implementations may
/// observe it to abandon slow I/O early; the pool itself never interrupts an
/// invocation that has started.
pub trait Work<T>: Send + Sync + 'static {
    /// Payload reported for a successful item.
    type Output: Send + 'static;
    /// Error reported for a failed item.
    type Error: Send + 'static;

    fn run(
        &self,
        scope: CancellationToken,
        item: T,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

impl<T, F, Fut, P, E> Work<T> for F
where
    F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<P, E>> + Send,
    P: Send + 'static,
    E: Send + 'static,
{
    type Output = P;
    type Error = E;

    fn run(&self, scope: CancellationToken, item: T) -> impl Future<Output = Result<P, E>> + Send {
        self(scope, item)
    }
}
