//! Tracing setup for the CLI and the HTTP server.
//!
//! Human-readable events go to stderr so stdout carries nothing but answers. A second,
//! ANSI-free layer writes the same events to a log file: `SMARTDOC_LOG_FILE` when set,
//! `logs/smartdoc.log` otherwise.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable that overrides the log file location.
pub const LOG_FILE_ENV: &str = "SMARTDOC_LOG_FILE";

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "smartdoc.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where the file layer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Append to an explicitly configured file.
    File(PathBuf),
    /// `smartdoc.log` inside the default directory, created on demand.
    DefaultDir(PathBuf),
}

impl LogTarget {
    /// Resolve the target from the value of [`LOG_FILE_ENV`]. Blank values fall back to the
    /// default location.
    pub fn resolve(override_path: Option<&str>) -> Self {
        match override_path.map(str::trim).filter(|path| !path.is_empty()) {
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::DefaultDir(PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }

    /// Path of the file that receives log lines.
    pub fn file_path(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::DefaultDir(dir) => dir.join(DEFAULT_LOG_NAME),
        }
    }
}

/// Install the stderr and file layers, filtered by `RUST_LOG` (default `info`).
///
/// A second call leaves the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let target = LogTarget::resolve(std::env::var(LOG_FILE_ENV).ok().as_deref());
    let file_layer = open_writer(&target).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .compact()
    });

    // `Option<Layer>` is itself a layer, so a missing file simply disables it.
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    if let Err(err) = installed {
        eprintln!("Tracing already initialized: {err}");
    }
}

/// Open a non-blocking writer for `target`, keeping its guard alive for the process.
fn open_writer(target: &LogTarget) -> Option<NonBlocking> {
    let opened = match target {
        LogTarget::File(path) => append_to(path),
        LogTarget::DefaultDir(dir) => {
            std::fs::create_dir_all(dir).and_then(|_| append_to(&target.file_path()))
        }
    };
    match opened {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(writer)
        }
        Err(err) => {
            eprintln!(
                "File logging disabled; cannot open {}: {err}",
                target.file_path().display()
            );
            None
        }
    }
}

fn append_to(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_path_wins() {
        let target = LogTarget::resolve(Some("/var/log/smartdoc/run.log"));
        assert_eq!(
            target.file_path(),
            PathBuf::from("/var/log/smartdoc/run.log")
        );
    }

    #[test]
    fn missing_or_blank_override_uses_default_location() {
        for value in [None, Some(""), Some("   ")] {
            let target = LogTarget::resolve(value);
            assert_eq!(target, LogTarget::DefaultDir(PathBuf::from("logs")));
            assert_eq!(target.file_path(), Path::new("logs").join("smartdoc.log"));
        }
    }

    #[test]
    fn writer_creates_missing_default_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = LogTarget::DefaultDir(dir.path().join("nested").join("logs"));
        assert!(open_writer(&target).is_some());
        assert!(target.file_path().is_file());
    }
}
