//! Tracing bootstrap for processes embedding the capture service.

use loopgrab_common::logging::{ensure_log_dir, SERVICE_LOG_PREFIX};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: stderr plus a daily rolling log file.
///
/// Falls back to stderr only when the log directory is unavailable. Keep the
/// returned guard alive for the life of the process so buffered file output
/// is flushed. Calling this twice is harmless.
pub fn init_logging() -> Option<WorkerGuard> {
    let console = fmt::layer().with_writer(std::io::stderr);

    let appender = ensure_log_dir().map_err(|e| e.to_string()).and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(SERVICE_LOG_PREFIX)
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| e.to_string())
    });

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(console)
                .with(file)
                .try_init();
            Some(guard)
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(console)
                .try_init();
            tracing::warn!("File logging disabled: {}", e);
            None
        }
    }
}
