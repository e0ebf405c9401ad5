//! Tracing setup for the `unsub` binary.
//!
//! Logs go to stderr (compact) and to a daily rolling file without ANSI
//! colors. Stdout is reserved for the JSON the commands print, so
//! `unsub status | jq` sees nothing else. `RUST_LOG` wins over the verbosity
//! flag.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Overrides the log directory.
pub const LOG_DIR_ENV: &str = "UNSUB_LOG_DIR";

const APP_DIR: &str = "unsubscriber";
const LOG_FILE_PREFIX: &str = "unsub";

/// Directory the daily log files are written to.
pub fn log_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .map(|root| root.join(APP_DIR).join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Default filter when `RUST_LOG` is not set.
pub const fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the life of the process.
pub fn init_tracing(verbose: bool) -> Option<WorkerGuard> {
    let log_dir = log_dir();

    let file_layer = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false) // No ANSI colors in files
                .compact();
            Some((layer, guard))
        }
        Err(e) => {
            eprintln!("Failed to create log directory {}: {e}", log_dir.display());
            None
        }
    };
    let (file_layer, guard) = file_layer.unzip();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(file_layer)
        .try_init()
        .ok(); // Ignore error if already initialized

    guard
}
