//! Canonical types shared by every stage: severity, log record, window, feature vector.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed severity set. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// ERROR and CRITICAL both count toward the error bucket.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Text,
    Json,
    Csv,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Text => "text",
            SourceFormat::Json => "json",
            SourceFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record came from: file, 1-based line/row (or array element) index, format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub index: u64,
    pub format: SourceFormat,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.index)
    }
}

/// Validated, normalized representation of one log entry.
///
/// Only the normalizer constructs these. Fields are read-only; the
/// annotation map is the single extension point for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    service: String,
    severity: Severity,
    message: String,
    message_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    provenance: Provenance,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, Value>,
}

/// Already-validated parts of a record, assembled by the normalizer.
pub(crate) struct RecordParts {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub severity: Severity,
    pub message: String,
    pub message_hash: String,
    pub duration_ms: Option<f64>,
    pub error_code: Option<String>,
    pub request_id: Option<String>,
    pub provenance: Provenance,
}

impl LogRecord {
    pub(crate) fn from_parts(p: RecordParts) -> Self {
        Self {
            timestamp: p.timestamp,
            service: p.service,
            severity: p.severity,
            message: p.message,
            message_hash: p.message_hash,
            duration_ms: p.duration_ms,
            error_code: p.error_code,
            request_id: p.request_id,
            provenance: p.provenance,
            annotations: BTreeMap::new(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 16 hex chars; stable across runs and platforms.
    pub fn message_hash(&self) -> &str {
        &self.message_hash
    }

    pub fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn annotations(&self) -> &BTreeMap<String, Value> {
        &self.annotations
    }

    /// Attach downstream data (e.g. an anomaly score) without touching the schema.
    pub fn annotate(&mut self, key: impl Into<String>, value: Value) {
        self.annotations.insert(key.into(), value);
    }
}

/// Grouping key for windows. Orders by start time, then service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub window_start: DateTime<Utc>,
    pub service: String,
}

/// All records of one service falling in one calendar-aligned window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationWindow {
    window_start: DateTime<Utc>,
    window_size_seconds: i64,
    service: String,
    records: Vec<LogRecord>,
}

impl AggregationWindow {
    pub fn new(window_start: DateTime<Utc>, window_size_seconds: i64, service: impl Into<String>) -> Self {
        Self {
            window_start,
            window_size_seconds,
            service: service.into(),
            records: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, record: LogRecord) {
        self.records.push(record);
    }

    /// Stable sort: ties keep their arrival order.
    pub(crate) fn sort_chronologically(&mut self) {
        self.records.sort_by_key(|r| r.timestamp);
    }

    pub fn key(&self) -> WindowKey {
        WindowKey {
            window_start: self.window_start,
            service: self.service.clone(),
        }
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Exclusive upper bound. Saturates at `DateTime::<Utc>::MAX_UTC`.
    pub fn window_end(&self) -> DateTime<Utc> {
        TimeDelta::try_seconds(self.window_size_seconds)
            .and_then(|size| self.window_start.checked_add_signed(size))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn window_size_seconds(&self) -> i64 {
        self.window_size_seconds
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn log_count(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<LogRecord> {
        self.records
    }
}

/// Statistical summary of one window, consumed by anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub window_start: DateTime<Utc>,
    pub service: String,

    pub total_events: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub info_count: u64,

    /// In [0, 1]; 0 when the window is empty
    pub error_rate: f64,
    pub warning_rate: f64,

    /// Present iff at least one record carried a duration
    pub median_duration_ms: Option<f64>,
    pub p95_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,

    pub unique_messages: u64,
    pub unique_error_codes: u64,

    /// Audit data: extraction timestamp, raw record count
    pub metadata: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
}

impl FeatureVector {
    pub fn get(&self, field: FeatureField) -> Option<f64> {
        match field {
            FeatureField::TotalEvents => Some(self.total_events as f64),
            FeatureField::ErrorCount => Some(self.error_count as f64),
            FeatureField::WarningCount => Some(self.warning_count as f64),
            FeatureField::InfoCount => Some(self.info_count as f64),
            FeatureField::ErrorRate => Some(self.error_rate),
            FeatureField::WarningRate => Some(self.warning_rate),
            FeatureField::MedianDurationMs => self.median_duration_ms,
            FeatureField::P95DurationMs => self.p95_duration_ms,
            FeatureField::MaxDurationMs => self.max_duration_ms,
            FeatureField::UniqueMessages => Some(self.unique_messages as f64),
            FeatureField::UniqueErrorCodes => Some(self.unique_error_codes as f64),
        }
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: Value) {
        self.annotations.insert(key.into(), value);
    }
}

/// The eleven numeric features, addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureField {
    TotalEvents,
    ErrorCount,
    WarningCount,
    InfoCount,
    ErrorRate,
    WarningRate,
    MedianDurationMs,
    P95DurationMs,
    MaxDurationMs,
    UniqueMessages,
    UniqueErrorCodes,
}

impl FeatureField {
    pub const ALL: [FeatureField; 11] = [
        FeatureField::TotalEvents,
        FeatureField::ErrorCount,
        FeatureField::WarningCount,
        FeatureField::InfoCount,
        FeatureField::ErrorRate,
        FeatureField::WarningRate,
        FeatureField::MedianDurationMs,
        FeatureField::P95DurationMs,
        FeatureField::MaxDurationMs,
        FeatureField::UniqueMessages,
        FeatureField::UniqueErrorCodes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureField::TotalEvents => "total_events",
            FeatureField::ErrorCount => "error_count",
            FeatureField::WarningCount => "warning_count",
            FeatureField::InfoCount => "info_count",
            FeatureField::ErrorRate => "error_rate",
            FeatureField::WarningRate => "warning_rate",
            FeatureField::MedianDurationMs => "median_duration_ms",
            FeatureField::P95DurationMs => "p95_duration_ms",
            FeatureField::MaxDurationMs => "max_duration_ms",
            FeatureField::UniqueMessages => "unique_messages",
            FeatureField::UniqueErrorCodes => "unique_error_codes",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown feature field: {0}")]
pub struct UnknownFeatureField(pub String);

impl FromStr for FeatureField {
    type Err = UnknownFeatureField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFeatureField(s.to_string()))
    }
}

impl fmt::Display for FeatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
