//! CSV rows, read through a caller-supplied column mapping.

use super::{LogParser, ParsedFields, ParsingError};
use crate::config::CsvColumnMapping;
use crate::ingest::RawRecord;
use crate::schema::SourceFormat;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CsvParser {
    mapping: CsvColumnMapping,
}

const LEVEL_COLUMN: &str = "level";
const DURATION_COLUMN: &str = "duration_ms";
const ERROR_CODE_COLUMN: &str = "error_code";
const REQUEST_ID_COLUMN: &str = "request_id";

impl CsvParser {
    /// Checks every mapped column against the source header, then fills
    /// unmapped optional fields from conventionally named columns if present.
    pub fn new(mut mapping: CsvColumnMapping, header: &[String]) -> Result<Self, ParsingError> {
        let has = |col: &str| header.iter().any(|h| h == col);
        let missing: Vec<String> = mapped_columns(&mapping)
            .filter(|col| !has(*col))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ParsingError::MissingColumns(missing));
        }

        for (slot, conventional) in [
            (&mut mapping.level, LEVEL_COLUMN),
            (&mut mapping.duration, DURATION_COLUMN),
            (&mut mapping.error_code, ERROR_CODE_COLUMN),
            (&mut mapping.request_id, REQUEST_ID_COLUMN),
        ] {
            if slot.is_none() && has(conventional) {
                *slot = Some(conventional.to_string());
            }
        }
        Ok(Self { mapping })
    }

    pub fn mapping(&self) -> &CsvColumnMapping {
        &self.mapping
    }
}

fn mapped_columns(m: &CsvColumnMapping) -> impl Iterator<Item = &str> {
    [
        Some(m.timestamp.as_str()),
        m.level.as_deref(),
        Some(m.service.as_str()),
        Some(m.message.as_str()),
        m.duration.as_deref(),
        m.error_code.as_deref(),
        m.request_id.as_deref(),
    ]
    .into_iter()
    .flatten()
}

/// Trimmed cell text; empty cells count as absent.
fn cell(raw: &RawRecord, column: Option<&str>) -> Option<String> {
    let value = raw.get(column?)?.as_str()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl LogParser for CsvParser {
    fn parse(&self, raw: &RawRecord) -> Option<ParsedFields> {
        let m = &self.mapping;
        let mut fields = ParsedFields::new(raw.provenance.clone());
        fields.timestamp = cell(raw, Some(m.timestamp.as_str())).map(Value::String);
        fields.service = cell(raw, Some(m.service.as_str()));
        fields.message = cell(raw, Some(m.message.as_str()));
        if !fields.has_required() {
            return None;
        }
        fields.level = cell(raw, m.level.as_deref());
        fields.default_level();
        fields.duration = cell(raw, m.duration.as_deref()).map(Value::String);
        fields.error_code = cell(raw, m.error_code.as_deref());
        fields.request_id = cell(raw, m.request_id.as_deref());
        Some(fields)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }
}
