//! Pipeline configuration. Passed explicitly into every entry point; never global.

use crate::aggregate::window_size;
use crate::ingest::FormatChoice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WINDOW_SIZE_SECONDS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Aggregation window size in seconds (positive, within chrono's time range)
    pub window_size_seconds: i64,
    /// Input format; `auto` detects by file extension
    pub format: FormatChoice,
    /// CSV field delimiter (single ASCII character)
    pub csv_delimiter: char,
    /// Column mapping, required only for CSV input
    pub csv_columns: Option<CsvColumnMapping>,
    /// Pin the extraction timestamp written into feature metadata.
    /// When unset, the time the extractor is created is used.
    pub extraction_timestamp: Option<DateTime<Utc>>,
    /// Logging
    pub log: LogConfig,
}

/// Header names holding each candidate field in a CSV source.
/// Omitted required keys take the conventional names (`timestamp`, `service`,
/// `message`). Omitted optional keys stay unmapped; the parser picks up a
/// conventionally named column (`level`, `duration_ms`, ...) when the header has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvColumnMapping {
    pub timestamp: String,
    pub level: Option<String>,
    pub service: String,
    pub message: String,
    pub duration: Option<String>,
    pub error_code: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window size must be positive and fit the supported time range, got {0}")]
    InvalidWindowSize(i64),

    #[error("csv delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size_seconds: DEFAULT_WINDOW_SIZE_SECONDS,
            format: FormatChoice::Auto,
            csv_delimiter: ',',
            csv_columns: None,
            extraction_timestamp: None,
            log: LogConfig::default(),
        }
    }
}

impl Default for CsvColumnMapping {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            level: None,
            service: "service".to_string(),
            message: "message".to_string(),
            duration: None,
            error_code: None,
            request_id: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl PipelineConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<PipelineConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if window_size(self.window_size_seconds).is_err() {
            return Err(ConfigError::InvalidWindowSize(self.window_size_seconds));
        }
        if !self.csv_delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter(self.csv_delimiter));
        }
        Ok(())
    }

    /// Delimiter as the byte the CSV reader expects. Call after `validate`.
    pub fn csv_delimiter_byte(&self) -> u8 {
        if self.csv_delimiter.is_ascii() {
            self.csv_delimiter as u8
        } else {
            b','
        }
    }
}
