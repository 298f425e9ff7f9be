//! Captures tracing output for assertions in behavioural tests.
//!
//! Lines are recorded without timestamps or colour codes so assertions can
//! match messages and `key=value` fields directly. Only events emitted on
//! the calling thread are captured.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `action` with a subscriber recording events at `level` and above,
/// returning the recorded lines alongside the closure result.
///
/// # Examples
/// ```
/// use lightcurve_acquire::test_support::capture_logs;
/// use tracing::Level;
///
/// let (logs, value) = capture_logs(Level::WARN, || {
///     tracing::info!("not recorded");
///     tracing::warn!(id = 42, "fetch failed");
///     7
/// });
/// assert_eq!(logs.len(), 1);
/// assert!(logs[0].contains("fetch failed") && logs[0].contains("id=42"));
/// assert_eq!(value, 7);
/// ```
#[must_use]
pub fn capture_logs<F, R>(level: Level, action: F) -> (Vec<String>, R)
where
    F: FnOnce() -> R,
{
    let buffer = SharedBuffer::default();
    let sink = buffer.clone();
    let subscriber = fmt()
        .with_max_level(level)
        .without_time()
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();

    let result = with_default(subscriber, action);
    (buffer.lines(), result)
}
