//! Tracing and logging setup shared by comicshelf processes.

/// Initialize process-wide observability (JSON logs).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use crate::tracing::{LogFormat, UnknownLogFormat, init_with};
