//! Console and daily rotating file logging.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::PROJECT_NAME;

/// Environment variable overriding the log filter, e.g. `gdrive2sheet=trace`.
pub const LOG_ENV_VAR: &str = "GDRIVE2SHEET_LOG";

/// Install the global subscriber.
///
/// The file under `log_dir` gets everything down to DEBUG and rotates at
/// midnight; stderr gets INFO, or DEBUG when `verbose`. The returned guard
/// flushes the file writer and must be held until exit.
pub fn init_logging(log_dir: &Path, verbose: bool) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=debug,warn", PROJECT_NAME)));

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(console_level);

    let file_appender = rolling::daily(log_dir, format!("{}.log", PROJECT_NAME));
    let (non_blocking_writer, guard) = non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(LevelFilter::DEBUG);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if init_result.is_err() {
        eprintln!("Failed to initialize tracing subscriber. Logging may not work.");
        return None;
    }

    Some(guard)
}
