use crate::{HubError, HubResult};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable naming a file that receives debug-level logs.
pub const LOG_FILE_ENV: &str = "PROJECTHUB_LOG_FILE";

/// Install the global tracing subscriber.
///
/// With `PROJECTHUB_LOG_FILE` set, everything at debug level and above is
/// appended to that file without ANSI colors. Otherwise logs go to stderr,
/// filtered by `RUST_LOG` (default `default_filter`).
pub fn init(default_filter: &str) -> HubResult<()> {
    if let Ok(log_path) = std::env::var(LOG_FILE_ENV) {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        tracing_subscriber::registry()
            .with(EnvFilter::new("debug"))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(log_file))
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false),
            )
            .try_init()
            .map_err(|e| HubError::Internal(e.to_string()))
    } else {
        tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_filter)),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| HubError::Internal(e.to_string()))
    }
}
