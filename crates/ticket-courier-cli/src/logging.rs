use std::env;
use std::path::{Path, PathBuf};
use ticket_courier_core::config::LoggingConfig;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Directory and file name of the log file: `LOG_FILE_PATH` when set,
/// otherwise the configured path.
fn log_file_location(configured: &Path, from_env: Option<String>) -> (PathBuf, PathBuf) {
    let path = from_env
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| configured.to_path_buf());
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ticket-courier.log"));
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, file_name)
}

/// Stdout plus file logging. Keep the returned guard alive until exit so
/// the file writer flushes.
pub fn init_logger(config: &LoggingConfig) -> WorkerGuard {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| config.level.clone());
    let filter_layer = EnvFilter::new(filter);

    let (log_dir, log_file) = log_file_location(&config.path, env::var("LOG_FILE_PATH").ok());

    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(filter_layer)
        .init();

    info!(
        "Tracing is configured for stdout and {}",
        log_dir.join(&log_file).display()
    );

    guard
}
