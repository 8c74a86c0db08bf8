//! Logging setup

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to create log directory: {0}")]
    Io(#[from] io::Error),
    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),
    #[error("failed to install subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Install the global subscriber
///
/// Events go to stdout (JSON when `log_json` is set) and to
/// `<log_dir>/<service_name>.log`. `RUST_LOG` takes precedence over the
/// configured level. Keep the returned guard alive until shutdown or
/// buffered file output is lost.
pub fn init_logging(config: &AppConfig) -> Result<WorkerGuard, TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (file_writer, guard) = file_writer(&config.log_dir, &config.service_name)?;

    let json_stdout = config.log_json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
    });
    let text_stdout = (!config.log_json).then(|| fmt::layer().with_target(true));
    let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_stdout)
        .with(text_stdout)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn file_writer(
    dir: &Path,
    service_name: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), TelemetryError> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(service_name)
        .filename_suffix("log")
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}
