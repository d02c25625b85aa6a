//! Logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level is used, raised
//! to `debug` by `--verbose`. Logs go to stderr so stdout stays clean for
//! bookmark and record output.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is absent.
pub fn default_directive(log_level: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else if log_level.trim().is_empty() {
        "info".to_string()
    } else {
        log_level.trim().to_string()
    }
}

/// Initialize tracing for the process
pub fn init_logging(log_level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level, verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();

    debug!("etljob started, verbose: {verbose}");
}
