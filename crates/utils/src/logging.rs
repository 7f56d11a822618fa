//! provides logging helpers

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::InitError;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Optional path of a log file mirrored next to stderr, rotated daily.
pub const LOG_PATH_ENV_VAR: &str = "E2E_LOG_PATH";

/// initiate the global tracing subscriber
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`). When
/// `log_path` is set the same events are also written to a daily rolling
/// file; the returned guard must be held until exit to flush it.
pub fn init<P: AsRef<Path>>(log_path: Option<P>) -> Option<WorkerGuard> {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let mut appender_error = None;
    let file_writer = log_path.and_then(|path| match file_appender(path.as_ref()) {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            appender_error = Some(format!("{}: {e}", path.as_ref().display()));
            None
        }
    });
    let (file_writer, guard) = match file_writer {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    let stderr_layer = layer().with_writer(std::io::stderr).with_target(true);
    let file_layer = file_writer.map(|writer| layer().with_writer(writer).with_ansi(false));

    registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = appender_error {
        tracing::warn!("log file disabled, failed to create appender for {e}");
    }
    guard
}

/// Daily rolling appender writing `<file name>.<date>` next to `path`.
pub fn file_appender(path: &Path) -> Result<RollingFileAppender, InitError> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "e2e.log".to_string());

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(3)
        .build(directory)
}
