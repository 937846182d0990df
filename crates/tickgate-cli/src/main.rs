#![doc = include_str!("../README.md")]

mod app;

use app::config::{CliArgs, RunConfig};
use app::run::run;
use app::telemetry::init_telemetry;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// mimalloc holds up better than the system allocator when many workers
// allocate request buffers at once, especially on musl.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let scope = CancellationToken::new();
    tokio::spawn(shutdown_signal(scope.clone()));

    let summary = run(config, scope.clone(), &mut std::io::stdout()).await?;
    // Stop listening for signals once the run is over.
    scope.cancel();

    println!(
        "submitted {} completed {} failed {} missing {}",
        summary.submitted,
        summary.succeeded,
        summary.failed,
        summary.missing()
    );

    if !summary.is_clean() {
        anyhow::bail!(
            "{} of {} URLs failed or were not fetched",
            summary.failed + summary.missing(),
            summary.submitted
        );
    }
    Ok(())
}

fn log_startup_info(_config: &RunConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting run with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Fetching {} URLs with {} workers at {} per {:?}",
            _config.urls.len(),
            _config.concurrency,
            _config.intervals,
            _config.time_span
        );
    }
}

/// Cancels `scope` on Ctrl+C or SIGTERM. Returns early if `scope` is
/// cancelled by someone else.
async fn shutdown_signal(scope: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to install SIGTERM handler: {:?}", _e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to install Ctrl+C handler: {:?}", _e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = scope.cancelled() => return,
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, cancelling outstanding requests...");

    scope.cancel();
}
