//! Tracing setup: console output plus a daily-rotated log file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use quarry_core::config::LoggingConfig;

/// Initialize the global subscriber. Returns the file writer guard; dropping
/// it flushes buffered log lines, so hold it for the life of the process.
///
/// `RUST_LOG` wins over the configured level. If the log directory cannot be
/// used, logging continues on the console alone.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("quarry")
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1))
        .build(&config.directory);

    let console = fmt::layer().with_target(false);
    let registry = tracing_subscriber::registry().with(filter).with(console);

    match file_appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        Err(e) => {
            registry.init();
            tracing::warn!(
                directory = %config.directory,
                error = %e,
                "file logging unavailable, console only"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_directory_falls_back_to_console() {
        let config = LoggingConfig {
            level: String::from("debug"),
            directory: String::from("/dev/null/not-a-directory"),
            backup_count: 2,
        };
        // First init in the test process wins; either way this must not panic.
        let guard = init(&config);
        assert!(guard.is_none());
    }
}
