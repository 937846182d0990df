//! Command-line front end: configuration, logging and the fetch run itself.
//!
//! - [`config`] - `clap` arguments and the validated [`config::RunConfig`].
//! - [`run`] - drives one dispatch run and reports each outcome.
//! - [`telemetry`] - `tracing-subscriber` setup.

pub mod config;
pub mod run;
pub mod telemetry;
