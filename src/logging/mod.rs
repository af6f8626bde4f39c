//! Structured logging setup and NDJSON output helpers.

mod format;

pub use format::{RunSummary, StructuredLogger};
