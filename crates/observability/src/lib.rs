//! Tracing/logging setup shared by SchoolERP binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide tracing with the given output format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}
