use crate::{Error, TokenSource};
use core::time::Duration;
use futures::StreamExt;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[test]
fn rejects_zero_intervals() {
    let scope = CancellationToken::new();
    let err = TokenSource::new(&scope, Duration::from_secs(1), 0).unwrap_err();
    assert!(matches!(err, Error::InvalidIntervals { intervals: 0, .. }));
}

#[test]
fn rejects_zero_period() {
    let scope = CancellationToken::new();
    let err = TokenSource::new(&scope, Duration::from_nanos(3), 5).unwrap_err();
    assert_eq!(
        err,
        Error::InvalidPeriod {
            time_span: Duration::from_nanos(3),
            intervals: 5
        }
    );
}

#[test]
fn requires_a_runtime() {
    let scope = CancellationToken::new();
    let err = TokenSource::new(&scope, Duration::from_secs(1), 5).unwrap_err();
    assert_eq!(err, Error::NoRuntime);
}

#[tokio::test(start_paused = true)]
async fn reports_shape() {
    let scope = CancellationToken::new();
    let source = TokenSource::new(&scope, Duration::from_secs(2), 8).unwrap();
    assert_eq!(source.capacity(), 8);
    assert_eq!(source.period(), Duration::from_millis(250));
    assert_eq!(source.available(), 0);
    assert!(!source.is_stopped());
    source.stop();
}

#[tokio::test(start_paused = true)]
async fn never_buffers_more_than_intervals() {
    let shapes = [
        (Duration::from_secs(1), 5),
        (Duration::from_secs(2), 10),
        (Duration::from_millis(300), 3),
        (Duration::from_secs(1), 1),
    ];

    for (time_span, intervals) in shapes {
        let scope = CancellationToken::new();
        let source = TokenSource::new(&scope, time_span, intervals).unwrap();
        let half_period = source.period() / 2;

        sleep(time_span + half_period).await;
        assert_eq!(source.available(), intervals, "shape {time_span:?}/{intervals}");

        // Idle time must not accumulate beyond the buffer.
        sleep(time_span * 3).await;
        assert_eq!(source.available(), intervals, "shape {time_span:?}/{intervals}");

        let mut drained = 0;
        while source.try_acquire() {
            drained += 1;
        }
        assert_eq!(drained, intervals);

        scope.cancel();
    }
}

#[tokio::test(start_paused = true)]
async fn spaces_tokens_by_period() {
    let scope = CancellationToken::new();
    let source = TokenSource::new(&scope, Duration::from_secs(1), 5).unwrap();
    let period = source.period();

    let start = Instant::now();
    let mut last = start;
    for i in 0..10 {
        assert!(source.acquire(&scope).await);
        let now = Instant::now();
        if i == 0 {
            assert!(now - start >= period, "first token arrived early");
        } else {
            assert!(now - last >= period, "token {i} arrived early");
        }
        last = now;
    }

    // 10 tokens at 5 per second cannot take less than 2 seconds.
    assert!(Instant::now() - start >= Duration::from_secs(2));
    source.stop();
}

#[tokio::test(start_paused = true)]
async fn each_token_goes_to_one_waiter() {
    let scope = CancellationToken::new();
    let source = TokenSource::new(&scope, Duration::from_secs(1), 5).unwrap();
    let consumed = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let source = source.clone();
            let scope = scope.clone();
            let consumed = Arc::clone(&consumed);
            tokio::spawn(async move {
                while source.acquire(&scope).await {
                    consumed.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    // Ticks land at 200ms, 400ms, ..., 2000ms.
    sleep(Duration::from_millis(2100)).await;
    scope.cancel();
    futures::future::join_all(waiters).await;

    assert_eq!(consumed.load(Ordering::Relaxed), 10);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let scope = CancellationToken::new();
    let source = TokenSource::new(&scope, Duration::from_secs(1), 5).unwrap();

    source.stop();
    source.stop();

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let source = source.clone();
            tokio::spawn(async move { source.stop() })
        })
        .collect();
    for stopper in futures::future::join_all(stoppers).await {
        stopper.unwrap();
    }

    assert!(source.is_stopped());
    assert!(!source.acquire(&CancellationToken::new()).await);
}

#[tokio::test(start_paused = true)]
async fn no_tokens_after_stop() {
    let scope = CancellationToken::new();
    let source = TokenSource::new(&scope, Duration::from_secs(1), 5).unwrap();

    sleep(Duration::from_millis(1100)).await;
    assert_eq!(source.available(), 5);

    source.stop();
    assert!(!source.try_acquire());
    assert_eq!(source.available(), 0);

    sleep(Duration::from_secs(5)).await;
    assert!(!source.try_acquire());
    assert!(!source.acquire(&scope).await);
}

#[tokio::test(start_paused = true)]
async fn scope_cancellation_stops_the_source() {
    let scope = CancellationToken::new();
    let source = TokenSource::new(&scope, Duration::from_secs(1), 5).unwrap();

    scope.cancel();
    assert!(source.is_stopped());

    // A waiter on an unrelated scope still observes the shutdown.
    let other = CancellationToken::new();
    assert!(!source.acquire(&other).await);
}

#[tokio::test(start_paused = true)]
async fn acquire_returns_false_on_cancel() {
    let source_scope = CancellationToken::new();
    let source = TokenSource::new(&source_scope, Duration::from_secs(10), 1).unwrap();

    let caller = CancellationToken::new();
    let waiter = {
        let source = source.clone();
        let caller = caller.clone();
        tokio::spawn(async move { source.acquire(&caller).await })
    };

    sleep(Duration::from_secs(1)).await;
    caller.cancel();
    assert!(!waiter.await.unwrap());
    assert!(!source.is_stopped());
    source.stop();
}

#[tokio::test(start_paused = true)]
async fn raw_stream_yields_tokens_until_stopped() {
    let scope = CancellationToken::new();
    let source = TokenSource::new(&scope, Duration::from_secs(1), 5).unwrap();
    let mut raw = source.raw();

    let start = Instant::now();
    for _ in 0..3 {
        assert_eq!(raw.next().await, Some(()));
    }
    assert!(Instant::now() - start >= Duration::from_millis(600));

    source.stop();
    assert_eq!(raw.next().await, None);
}
