//! Operator-facing diagnostic telemetry via `tracing`, layered alongside (never
//! instead of) the durable `EventLog` JSONL stream (SPEC_FULL.md §2.1).
//!
//! Two sinks: an `EnvFilter`-controlled stderr layer (grounded on the
//! `tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env())`
//! pattern other repos in this corpus use for their CLI entry points) plus a
//! daily-rolling file appender under `.czarina/logs/trace/`, so a long-lived
//! `czar run` process keeps history past the terminal's scrollback.

use std::path::Path;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. Returns the `tracing-appender` guard; drop it
/// only at process exit or the background writer thread is torn down early and
/// buffered lines are lost.
pub fn init(trace_log_dir: &Path, verbose: bool) -> tracing_appender::non_blocking::WorkerGuard {
    std::fs::create_dir_all(trace_log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(trace_log_dir, "czarina.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
