use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

/// Command-line configuration for the `tickgate` binary.
///
/// Every option can also come from the environment, which is loaded from a
/// `.env` file first when present.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tickgate",
    version,
    about = "Fetch URLs at a bounded rate with a bounded number of workers"
)]
pub struct CliArgs {
    /// URLs to fetch. Combined with the contents of `--urls-file`.
    pub urls: Vec<String>,

    /// File with one URL per line. Blank lines and lines starting with `#`
    /// are ignored.
    ///
    /// Environment variable: `URLS_FILE`
    #[arg(long, env = "URLS_FILE")]
    pub urls_file: Option<PathBuf>,

    /// Number of workers, i.e. the maximum number of requests in flight.
    ///
    /// Environment variable: `CONCURRENCY`
    #[arg(short, long, env = "CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Length of the rate window in milliseconds.
    ///
    /// Environment variable: `TIME_SPAN_MS`
    #[arg(long, env = "TIME_SPAN_MS", default_value_t = 1000)]
    pub time_span_ms: u64,

    /// Number of requests allowed per rate window. Requests are spread evenly
    /// across the window.
    ///
    /// Environment variable: `INTERVALS`
    #[arg(short, long, env = "INTERVALS", default_value_t = 5)]
    pub intervals: usize,

    /// Timeout for a single request in milliseconds.
    ///
    /// Environment variable: `FETCH_TIMEOUT_MS`
    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value_t = 10_000)]
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub urls: Vec<String>,
    pub concurrency: usize,
    pub time_span: Duration,
    pub intervals: usize,
    pub fetch_timeout: Duration,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.concurrency == 0 {
            bail!("CONCURRENCY must be greater than 0");
        }
        if args.intervals == 0 {
            bail!("INTERVALS must be greater than 0");
        }
        if args.time_span_ms == 0 {
            bail!("TIME_SPAN_MS must be greater than 0");
        }
        if args.fetch_timeout_ms == 0 {
            bail!("FETCH_TIMEOUT_MS must be greater than 0");
        }

        let mut urls = args.urls;
        if let Some(path) = &args.urls_file {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read URL list {}", path.display()))?;
            urls.extend(parse_url_list(&contents));
        }
        if urls.is_empty() {
            bail!("no URLs given; pass them as arguments or with --urls-file");
        }

        Ok(Self {
            urls,
            concurrency: args.concurrency,
            time_span: Duration::from_millis(args.time_span_ms),
            intervals: args.intervals,
            fetch_timeout: Duration::from_millis(args.fetch_timeout_ms),
        })
    }
}

fn parse_url_list(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
}
