//! Shared tracing configuration for observability instrumentation.
//!
//! Centralises the log targets used by the crate so subscribers can filter
//! acquisition events without pulling in unrelated application logs.

use camino::Utf8Path;
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

/// Target used by cache store operations.
pub(crate) const CACHE_TARGET: &str = "lc_acquire::cache";

/// Target used by the single-item acquirer.
pub(crate) const ACQUIRE_TARGET: &str = "lc_acquire::acquire";

/// Target used by the batch orchestrator.
pub(crate) const BATCH_TARGET: &str = "lc_acquire::batch";

/// Target used by the tiered locator.
pub(crate) const LOCATOR_TARGET: &str = "lc_acquire::locator";

/// Target used by remote resolvers.
pub(crate) const RESOLVER_TARGET: &str = "lc_acquire::resolver";

/// Target used by the command-line driver.
pub(crate) const APP_TARGET: &str = "lc_acquire::app";

/// Installs a formatting subscriber writing to stderr and, when `log_file`
/// is given, appending the same lines to that file.
///
/// Installation is skipped silently when a global subscriber already exists,
/// which happens when the binary entry point is driven from tests.
///
/// # Errors
///
/// Returns an error when `log_file` cannot be opened for appending.
pub fn init_tracing(verbose: bool, log_file: Option<&Utf8Path>) -> io::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(log_writer(log_file)?)
        .with_ansi(log_file.is_none())
        .with_target(verbose)
        .try_init();
    if installed.is_err() {
        tracing::debug!(target: APP_TARGET, "tracing subscriber already installed");
    }
    Ok(())
}

fn log_writer(log_file: Option<&Utf8Path>) -> io::Result<BoxMakeWriter> {
    let Some(path) = log_file else {
        return Ok(BoxMakeWriter::new(io::stderr));
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BoxMakeWriter::new(io::stderr.and(Arc::new(file))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tracing::subscriber::with_default;

    #[test]
    fn log_file_receives_events_and_keeps_earlier_runs() {
        let temp = tempdir().expect("tempdir");
        let path = Utf8Path::from_path(temp.path())
            .expect("utf8 path")
            .join("download_log.txt");
        fs::write(&path, "earlier run\n").expect("seed");

        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(log_writer(Some(&path)).expect("open log file"))
            .finish();
        with_default(subscriber, || {
            tracing::info!(target: BATCH_TARGET, count = 3, "starting download");
        });

        let contents = fs::read_to_string(&path).expect("read log");
        assert!(contents.starts_with("earlier run\n"), "log was truncated: {contents}");
        assert!(contents.contains("starting download") && contents.contains("count=3"));
    }

    #[test]
    fn unopenable_log_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = Utf8Path::from_path(temp.path())
            .expect("utf8 path")
            .join("missing/dir/log.txt");

        assert!(log_writer(Some(&path)).is_err());
    }
}
