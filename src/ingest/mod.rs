//! Ingestion sources: plain text, JSON (NDJSON or array), CSV.
//! Each source yields raw field maps with provenance; no field semantics are interpreted here.
//!
//! Sources are lazy and restartable per call: `records()` opens the file anew and
//! the returned iterator holds at most one record. Per-record problems are logged
//! and the record is simply not yielded; fatal problems surface as `Err` items.

mod delimited;
mod json;
mod text;

pub use delimited::{CsvRecords, CsvSource};
pub use json::{JsonRecords, JsonSource};
pub use text::{TextRecords, TextSource};

pub use crate::schema::SourceFormat;
use crate::schema::Provenance;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Key under which text sources store the whole line.
pub const RAW_LINE_FIELD: &str = "raw_line";

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("log file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no well-formed JSON objects in {0}")]
    EmptyJson(PathBuf),

    #[error("csv file has no header row: {0}")]
    MissingCsvHeader(PathBuf),

    #[error("failed to read csv {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unknown input format: {0}")]
    UnknownFormat(String),
}

impl IngestionError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        IngestionError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One unit read from a source, before parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub fields: BTreeMap<String, Value>,
    pub provenance: Provenance,
}

impl RawRecord {
    pub fn text_line(line: &str, provenance: Provenance) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(RAW_LINE_FIELD.to_string(), Value::String(line.to_string()));
        Self { fields, provenance }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Requested input format; `Auto` resolves by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    #[default]
    Auto,
    Text,
    Json,
    Csv,
}

impl FormatChoice {
    /// Explicit choices always win over detection.
    pub fn resolve(self, path: &Path) -> SourceFormat {
        match self {
            FormatChoice::Auto => detect_format(path),
            FormatChoice::Text => SourceFormat::Text,
            FormatChoice::Json => SourceFormat::Json,
            FormatChoice::Csv => SourceFormat::Csv,
        }
    }
}

impl FromStr for FormatChoice {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(FormatChoice::Auto),
            "text" => Ok(FormatChoice::Text),
            "json" => Ok(FormatChoice::Json),
            "csv" => Ok(FormatChoice::Csv),
            other => Err(IngestionError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatChoice::Auto => "auto",
            FormatChoice::Text => "text",
            FormatChoice::Json => "json",
            FormatChoice::Csv => "csv",
        };
        f.write_str(s)
    }
}

/// `.json` → json, `.csv` → csv, everything else (`.log`, `.txt`, none) → text.
pub fn detect_format(path: &Path) -> SourceFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("json") => SourceFormat::Json,
        Some("csv") => SourceFormat::Csv,
        _ => SourceFormat::Text,
    }
}

/// Whether a path has one of the recognized log extensions.
pub fn is_supported_extension(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("log" | "txt" | "json" | "csv")
    )
}

pub(crate) fn ensure_exists(path: &Path) -> Result<(), IngestionError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IngestionError::NotFound(path.to_path_buf()))
    }
}

pub type RawRecords = Box<dyn Iterator<Item = Result<RawRecord, IngestionError>> + Send>;

/// A source of any supported format.
pub enum LogSource {
    Text(TextSource),
    Json(JsonSource),
    Csv(CsvSource),
}

impl LogSource {
    pub fn open(path: &Path, format: SourceFormat, csv_delimiter: u8) -> Result<Self, IngestionError> {
        Ok(match format {
            SourceFormat::Text => LogSource::Text(TextSource::open(path)?),
            SourceFormat::Json => LogSource::Json(JsonSource::open(path)?),
            SourceFormat::Csv => LogSource::Csv(CsvSource::open(path)?.with_delimiter(csv_delimiter)),
        })
    }

    pub fn format(&self) -> SourceFormat {
        match self {
            LogSource::Text(_) => SourceFormat::Text,
            LogSource::Json(_) => SourceFormat::Json,
            LogSource::Csv(_) => SourceFormat::Csv,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            LogSource::Text(s) => s.path(),
            LogSource::Json(s) => s.path(),
            LogSource::Csv(s) => s.path(),
        }
    }

    pub fn records(&self) -> Result<RawRecords, IngestionError> {
        let records: RawRecords = match self {
            LogSource::Text(s) => Box::new(s.records()?),
            LogSource::Json(s) => Box::new(s.records()?),
            LogSource::Csv(s) => Box::new(s.records()?),
        };
        Ok(records)
    }
}

/// Open `path` in the chosen format and return its lazy record sequence.
pub fn ingest(path: &Path, format: FormatChoice, csv_delimiter: u8) -> Result<RawRecords, IngestionError> {
    LogSource::open(path, format.resolve(path), csv_delimiter)?.records()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_by_extension() {
        assert_eq!(detect_format(Path::new("a.json")), SourceFormat::Json);
        assert_eq!(detect_format(Path::new("a.CSV")), SourceFormat::Csv);
        assert_eq!(detect_format(Path::new("a.log")), SourceFormat::Text);
        assert_eq!(detect_format(Path::new("a.txt")), SourceFormat::Text);
        assert_eq!(detect_format(Path::new("noext")), SourceFormat::Text);
    }

    #[test]
    fn explicit_choice_overrides_extension() {
        assert_eq!(FormatChoice::Json.resolve(Path::new("app.log")), SourceFormat::Json);
        assert_eq!(FormatChoice::Auto.resolve(Path::new("app.csv")), SourceFormat::Csv);
    }

    #[test]
    fn format_choice_parsing() {
        assert_eq!("JSON".parse::<FormatChoice>().unwrap(), FormatChoice::Json);
        assert!(matches!(
            "xml".parse::<FormatChoice>(),
            Err(IngestionError::UnknownFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = ingest(Path::new("/nonexistent/app.log"), FormatChoice::Auto, b',').err();
        assert!(matches!(err, Some(IngestionError::NotFound(_))));
    }

    #[test]
    fn dispatch_uses_detected_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, r#"{{"msg":"a"}}"#).unwrap();
        drop(f);

        let source = LogSource::open(&path, detect_format(&path), b',').unwrap();
        assert_eq!(source.format(), SourceFormat::Json);
        let records: Vec<_> = source.records().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].provenance.format, SourceFormat::Json);
    }
}
