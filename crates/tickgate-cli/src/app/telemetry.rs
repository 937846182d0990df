//! Log output for the `tickgate` binary.
//!
//! Results are printed on stdout; everything emitted through `tracing` goes
//! to stderr so the two can be redirected separately. The filter comes from
//! `RUST_LOG` and defaults to `info`. With the `tracing` feature enabled, the
//! library's own lifecycle events (token source, workers, run completion)
//! flow through the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    Ok(())
}
