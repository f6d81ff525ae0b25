use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use dionysus_core::config::LoggingConfig;
use dionysus_core::error::DionysusError;

const LOG_FILE_PREFIX: &str = "dionysus.log";

/// Build the filter: `RUST_LOG` when set, otherwise the configured directive.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Install the global subscriber: human-readable output on stderr, plus a
/// daily-rolling file in `log_dir` when file logging is enabled.
///
/// Keep the returned guard alive for as long as file output should be
/// flushed.
pub fn init(config: &LoggingConfig, log_dir: &Path) -> Result<Option<WorkerGuard>, DionysusError> {
    let (file, guard) = if config.file {
        std::fs::create_dir_all(log_dir)?;
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(env_filter(config))
        .with(fmt::layer().with_writer(io::stderr))
        .with(file.map(|writer| fmt::layer().with_ansi(false).with_writer(writer)))
        .try_init()
        .map_err(|e| DionysusError::Config(format!("logging already initialised: {e}")))?;

    tracing::debug!(file = config.file, "Logging initialised");
    Ok(guard)
}
