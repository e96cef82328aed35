//! Logging and tracing configuration
//!
//! The harness logs to stderr so that test reports on stdout stay readable.
//! A full trace (including every DAP message) can additionally be written
//! to a log file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// File name used when `--log-file` names a directory
const LOG_FILE: &str = "pptest.log";

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG with `verbose`), WARN for dependencies.
///
/// When `log_file` is set, a second layer writes everything down to TRACE
/// into that file. The returned guard must be kept alive for the file
/// writer to flush.
pub fn init_cli(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let default_directives = if verbose {
        "pptest=debug,warn"
    } else {
        "pptest=info,warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(filter);

    let Some(log_file) = log_file else {
        tracing_subscriber::registry().with(stderr_layer).init();
        return None;
    };

    let (dir, name) = log_location(log_file);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
    }
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(EnvFilter::new("pptest=trace,info"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Some(guard)
}

/// Directory and file name to log to
///
/// An existing directory, or a path ending in a separator, gets `pptest.log`
/// inside it.
fn log_location(path: &Path) -> (PathBuf, OsString) {
    let names_dir = path.is_dir() || path.as_os_str().to_string_lossy().ends_with(std::path::MAIN_SEPARATOR);
    match path.file_name() {
        Some(name) if !names_dir => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (dir, name.to_os_string())
        }
        _ => (path.to_path_buf(), LOG_FILE.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_location() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(
            log_location(dir.path()),
            (dir.path().to_path_buf(), OsString::from(LOG_FILE))
        );
        let file = dir.path().join("run.log");
        assert_eq!(log_location(&file), (dir.path().to_path_buf(), OsString::from("run.log")));
        assert_eq!(
            log_location(Path::new("run.log")),
            (PathBuf::from("."), OsString::from("run.log"))
        );

        let missing_dir = format!("{}{}", dir.path().join("logs").display(), std::path::MAIN_SEPARATOR);
        assert_eq!(log_location(Path::new(&missing_dir)).1, OsString::from(LOG_FILE));
    }
}
