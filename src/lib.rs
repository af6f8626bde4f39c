//! logfeat — deterministic log → feature-vector pipeline for anomaly detection.
//!
//! Modular structure:
//! - [`ingest`] — Text, JSON and CSV sources yielding raw records lazily
//! - [`parse`] — Format-specific candidate field extraction
//! - [`normalize`] — Validation into canonical [`LogRecord`]s
//! - [`aggregate`] — Calendar-aligned (window, service) bucketing
//! - [`features`] — Per-window statistical feature vectors
//! - [`baseline`] — Cross-window summary statistics
//! - [`pipeline`] — End-to-end orchestration with skip accounting
//! - [`logging`] — Structured logging and NDJSON output

pub mod aggregate;
pub mod baseline;
pub mod config;
pub mod features;
pub mod ingest;
pub mod logging;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod schema;

pub use aggregate::{aggregate, align_to_window, AggregationError, Windows};
pub use baseline::{baseline, deviations, BaselineError, BaselineStats};
pub use config::{ConfigError, CsvColumnMapping, PipelineConfig};
pub use features::{FeatureExtractionError, FeatureExtractor};
pub use ingest::{ingest, FormatChoice, IngestionError, RawRecord};
pub use logging::StructuredLogger;
pub use normalize::{normalize_batch, normalize_record, NormalizationError};
pub use parse::{parse_batch, parser_for, LogParser, ParsedFields, ParsingError};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineReport};
pub use schema::{
    AggregationWindow, FeatureField, FeatureVector, LogRecord, Provenance, Severity, SourceFormat, WindowKey,
};
