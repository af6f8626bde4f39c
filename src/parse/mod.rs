//! Parsers: extract candidate fields (timestamp, level, service, message, duration)
//! from raw records. Values stay loosely typed; validation belongs to the normalizer.
//!
//! Routine malformed input never errors: a parser returns `None` and the batch
//! form counts it. `ParsingError` is reserved for misconfiguration.

mod delimited;
mod json;
mod text;

pub use delimited::CsvParser;
pub use json::JsonParser;
pub use text::TextParser;

use crate::config::CsvColumnMapping;
use crate::ingest::RawRecord;
use crate::schema::{Provenance, SourceFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Level assigned when a structured record carries none.
pub const DEFAULT_LEVEL: &str = "INFO";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("csv header is missing mapped columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("csv input requires a column mapping")]
    MissingCsvMapping,
}

/// Candidate fields pulled out of one raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFields {
    /// ISO string, epoch number, or numeric string
    pub timestamp: Option<Value>,
    pub level: Option<String>,
    /// Level was absent and `DEFAULT_LEVEL` was substituted
    pub level_defaulted: bool,
    pub service: Option<String>,
    pub message: Option<String>,
    /// Milliseconds, number or numeric string
    pub duration: Option<Value>,
    pub error_code: Option<String>,
    pub request_id: Option<String>,
    pub provenance: Provenance,
}

impl ParsedFields {
    pub fn new(provenance: Provenance) -> Self {
        Self {
            timestamp: None,
            level: None,
            level_defaulted: false,
            service: None,
            message: None,
            duration: None,
            error_code: None,
            request_id: None,
            provenance,
        }
    }

    /// Fill in the default level if none was found.
    pub(crate) fn default_level(&mut self) {
        if self.level.is_none() {
            self.level = Some(DEFAULT_LEVEL.to_string());
            self.level_defaulted = true;
        }
    }

    /// Timestamp, service and message are all present.
    pub(crate) fn has_required(&self) -> bool {
        self.timestamp.is_some() && self.service.is_some() && self.message.is_some()
    }
}

pub trait LogParser: Send + Sync {
    /// Parse one raw record; `None` means unparseable.
    fn parse(&self, raw: &RawRecord) -> Option<ParsedFields>;
    fn format(&self) -> SourceFormat;
}

/// Build the parser for a resolved format. CSV needs a mapping and the source header.
pub fn build_parser(
    format: SourceFormat,
    csv_columns: Option<&CsvColumnMapping>,
    csv_header: &[String],
) -> Result<Box<dyn LogParser>, ParsingError> {
    let parser: Box<dyn LogParser> = match format {
        SourceFormat::Text => Box::new(TextParser::new()),
        SourceFormat::Json => Box::new(JsonParser::new()),
        SourceFormat::Csv => {
            let mapping = csv_columns.ok_or(ParsingError::MissingCsvMapping)?;
            Box::new(CsvParser::new(mapping.clone(), csv_header)?)
        }
    };
    Ok(parser)
}

/// Like [`build_parser`], from a format name (`text`, `json`, `csv`).
pub fn parser_for(
    format: &str,
    csv_columns: Option<&CsvColumnMapping>,
    csv_header: &[String],
) -> Result<Box<dyn LogParser>, ParsingError> {
    let format = match format {
        "text" => SourceFormat::Text,
        "json" => SourceFormat::Json,
        "csv" => SourceFormat::Csv,
        other => return Err(ParsingError::UnsupportedFormat(other.to_string())),
    };
    build_parser(format, csv_columns, csv_header)
}

/// Parse every record, keeping input order. Returns (parsed, skipped).
pub fn parse_batch(parser: &dyn LogParser, records: &[RawRecord]) -> (Vec<ParsedFields>, usize) {
    let mut parsed = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for raw in records {
        match parser.parse(raw) {
            Some(fields) => parsed.push(fields),
            None => {
                debug!(source = %raw.provenance, format = %parser.format(), "unparseable record");
                skipped += 1;
            }
        }
    }
    (parsed, skipped)
}

/// Scalar JSON value as text. Structured values are not usable as field text.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prov() -> Provenance {
        Provenance {
            source: "test".into(),
            index: 1,
            format: SourceFormat::Text,
        }
    }

    #[test]
    fn unknown_format_name_is_an_error() {
        let err = parser_for("xml", None, &[]).err();
        assert_eq!(err, Some(ParsingError::UnsupportedFormat("xml".into())));
    }

    #[test]
    fn csv_without_mapping_is_an_error() {
        let err = build_parser(SourceFormat::Csv, None, &[]).err();
        assert_eq!(err, Some(ParsingError::MissingCsvMapping));
    }

    #[test]
    fn batch_counts_skips_and_keeps_order() {
        let parser = parser_for("text", None, &[]).unwrap();
        let records = vec![
            RawRecord::text_line("2025-02-07T10:30:00Z INFO api first", prov()),
            RawRecord::text_line("garbage", prov()),
            RawRecord::text_line("2025-02-07T10:31:00Z ERROR api second", prov()),
        ];
        let (parsed, skipped) = parse_batch(parser.as_ref(), &records);
        assert_eq!(skipped, 1);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].message.as_deref(), Some("first"));
        assert_eq!(parsed[1].message.as_deref(), Some("second"));
    }

    #[test]
    fn batch_is_deterministic() {
        let parser = JsonParser::new();
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("ts".to_string(), Value::from(1_738_924_335));
        fields.insert("app".to_string(), Value::from("billing"));
        fields.insert("msg".to_string(), Value::from("charged"));
        let records = vec![RawRecord { fields, provenance: prov() }];
        assert_eq!(parse_batch(&parser, &records), parse_batch(&parser, &records));
    }
}
