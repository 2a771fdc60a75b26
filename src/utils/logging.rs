use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Filter from a `RUST_LOG`-style directive string, falling back to
/// [`DEFAULT_LOG_FILTER`] when it is missing or unparsable.
pub fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber. Diagnostics go to stderr, or are appended
/// to `log_file` when given so they do not interleave with streamed output.
pub fn init_tracing(log_file: Option<&Path>) -> io::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(rust_log.as_deref()))
        .with_target(true);

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    result.map_err(|err| io::Error::other(err.to_string()))?;

    tracing::debug!(log_file = ?log_file, "tracing initialized");
    Ok(())
}
