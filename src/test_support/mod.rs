//! Internal helpers re-exported for integration tests.
//!
//! Provides a scripted [`RemoteResolver`](crate::RemoteResolver) that never
//! touches the network and a log capture helper for asserting on tracing
//! output.

mod logging;
mod resolver;

pub use logging::capture_logs;
pub use resolver::{ScriptedResolver, Step, fits_payload};
