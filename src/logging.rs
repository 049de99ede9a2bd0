//! Diagnostic logging setup.
//!
//! Logs go to stderr; the session UI, progress bar included, draws to stdout,
//! so either stream can be redirected without the other.
//! `RUST_LOG` wins when set; otherwise the filter is `warn,yago=info`, or
//! `warn,yago=debug` with `--verbose`. An optional log file receives the same
//! events through a non-blocking writer.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const DEFAULT_FILTER: &str = "warn,yago=info";
pub const VERBOSE_FILTER: &str = "warn,yago=debug";

/// Keeps the file writer flushing; drop it only at process exit.
#[derive(Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Calling it twice is harmless; the second
/// call leaves the first subscriber in place.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<LoggingGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(build_filter(verbose));

    let mut guard = LoggingGuard::default();
    let file_layer = match log_file {
        Some(path) => {
            let (layer, file_guard) = build_file_layer(path, verbose)?;
            guard._file = Some(file_guard);
            Some(layer)
        }
        None => None,
    };

    let _ = Registry::default()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    Ok(guard)
}

fn build_file_layer(
    path: &Path,
    verbose: bool,
) -> Result<(Box<dyn Layer<Registry> + Send + Sync>, WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(build_filter(verbose))
        .boxed();
    Ok((layer, guard))
}
