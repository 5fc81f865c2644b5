//! Tracing/logging setup shared by the worker binaries.

use std::path::Path;

/// Tracing configuration (filters, formats, log files).
pub mod tracing;

pub use crate::tracing::LogFormat;
pub use tracing_appender::non_blocking::WorkerGuard;

/// Initialize process-wide logging with JSON output.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    crate::tracing::init(LogFormat::Json, None);
}

/// Initialize process-wide logging with an explicit output format.
pub fn init_with(format: LogFormat) {
    crate::tracing::init(format, None);
}

/// Like [`init_with`], also writing rotated log files under `log_dir`.
///
/// Dropping the returned guard flushes and stops the file writer.
#[must_use = "dropping the guard stops file logging"]
pub fn init_with_files(format: LogFormat, log_dir: &Path) -> Option<WorkerGuard> {
    crate::tracing::init(format, Some(log_dir))
}
