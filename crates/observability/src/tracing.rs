//! Tracing/logging initialization.

use std::io;
use std::path::Path;
use std::str::FromStr;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name prefix of the rotated log files.
pub const LOG_FILE_PREFIX: &str = "signer";
/// Rotated files kept on disk, current one included.
pub const LOG_FILES_KEPT: usize = 3;

/// Output format of the process log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line; default for unattended hosts.
    #[default]
    Json,
    /// Human-readable lines for interactive runs.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Daily-rotated `signer.<date>.log` files under `dir`, oldest pruned.
pub fn file_writer(dir: &Path) -> io::Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(LOG_FILES_KEPT)
        .build(dir)
        .map_err(io::Error::other)
}

fn fmt_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_timer(fmt::time::SystemTime)
        .with_target(false)
        .with_ansi(ansi);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.boxed(),
    }
}

/// Install the global subscriber. Filter comes from `RUST_LOG` (default `info`).
///
/// Events go to stdout and, when `log_dir` is given, to rotated files there
/// as well. The returned guard flushes the file writer on drop; hold it for
/// the life of the process. A log directory that cannot be opened leaves
/// stdout logging in place and is reported as a warning.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file, guard, file_error) = match log_dir.map(|dir| (dir, file_writer(dir))) {
        Some((_, Ok(appender))) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt_layer(format, writer, false)), Some(guard), None)
        }
        Some((dir, Err(err))) => (None, None, Some((dir, err))),
        None => (None, None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(format, io::stdout, true))
        .with(file)
        .try_init();

    if let Some((dir, err)) = file_error {
        tracing::warn!(dir = %dir.display(), error = %err, "log directory unusable, logging to stdout only");
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LogFormat::Pretty, None);
        init(LogFormat::Json, None);
    }

    #[test]
    fn file_writer_creates_dated_log_under_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("logs");

        let mut writer = file_writer(&dir).unwrap();
        writer.write_all(b"{\"message\":\"hello\"}\n").unwrap();
        writer.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
        assert!(names[0].starts_with("signer.") && names[0].ends_with(".log"), "{names:?}");
        let written = std::fs::read_to_string(dir.join(&names[0])).unwrap();
        assert!(written.contains("hello"));
    }

    #[test]
    fn unusable_log_dir_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        assert!(file_writer(&blocker).is_err());
    }
}
