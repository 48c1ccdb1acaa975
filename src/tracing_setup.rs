//! Logging initialization
//!
//! Structured logging via `tracing`, filtered by `RUST_LOG` (default `info`).
//! Logs go to stderr so CLI output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. Safe to call once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
