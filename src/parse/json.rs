//! Structured JSON records. Field names vary between producers, so each
//! candidate is looked up through a list of synonyms.

use super::{scalar_to_string, LogParser, ParsedFields};
use crate::ingest::RawRecord;
use crate::schema::SourceFormat;
use serde_json::Value;

const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "ts", "@timestamp"];
const LEVEL_KEYS: &[&str] = &["level", "severity", "level_name", "log_level"];
const SERVICE_KEYS: &[&str] = &["service", "app", "component", "source"];
const MESSAGE_KEYS: &[&str] = &["message", "msg", "text", "log_message"];
const DURATION_KEYS: &[&str] = &["duration_ms", "duration", "latency_ms"];
const ERROR_CODE_KEYS: &[&str] = &["error_code", "code", "err_code"];
const REQUEST_ID_KEYS: &[&str] = &["request_id", "trace_id", "correlation_id"];

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

/// First synonym holding a usable scalar.
fn first_value<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .find(|v| matches!(v, Value::String(_) | Value::Number(_)))
}

fn first_string(raw: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .find_map(scalar_to_string)
}

impl LogParser for JsonParser {
    fn parse(&self, raw: &RawRecord) -> Option<ParsedFields> {
        let mut fields = ParsedFields::new(raw.provenance.clone());
        fields.timestamp = first_value(raw, TIMESTAMP_KEYS).cloned();
        fields.service = first_string(raw, SERVICE_KEYS);
        fields.message = first_string(raw, MESSAGE_KEYS);
        if !fields.has_required() {
            return None;
        }
        fields.level = first_string(raw, LEVEL_KEYS);
        fields.default_level();
        fields.duration = first_value(raw, DURATION_KEYS).cloned();
        fields.error_code = first_string(raw, ERROR_CODE_KEYS);
        fields.request_id = first_string(raw, REQUEST_ID_KEYS);
        Some(fields)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }
}
