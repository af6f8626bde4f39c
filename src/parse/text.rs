//! Text lines of the form `TIMESTAMP LEVEL SERVICE MESSAGE [(<n>ms)]`.

use super::{LogParser, ParsedFields};
use crate::ingest::{RawRecord, RAW_LINE_FIELD};
use crate::schema::SourceFormat;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const LINE_PATTERN: &str = concat!(
    r"^(?P<ts>\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:[Zz]|[+-]\d{2}:?\d{2})?)",
    r"\s+(?P<level>(?i:DEBUG|INFO|WARNING|WARN|ERROR|ERR|CRITICAL|CRIT|FATAL|NOTICE))",
    r"\s+(?P<service>[A-Za-z0-9_.\-]+)",
    r"\s+(?P<message>\S.*)$",
);

const DURATION_PATTERN: &str = r"(?i)\((?P<value>\d+(?:\.\d+)?)\s*(?P<unit>ms|s)\)\s*$";

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LINE_PATTERN).expect("line pattern is valid"))
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DURATION_PATTERN).expect("duration pattern is valid"))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        Self
    }
}

/// Trailing `(500ms)` / `(1.5s)` suffix, in milliseconds.
fn duration_suffix(message: &str) -> Option<f64> {
    let caps = duration_regex().captures(message)?;
    let value: f64 = caps.name("value")?.as_str().parse().ok()?;
    let unit = caps.name("unit")?.as_str();
    if unit.eq_ignore_ascii_case("s") {
        Some(value * 1000.0)
    } else {
        Some(value)
    }
}

impl LogParser for TextParser {
    fn parse(&self, raw: &RawRecord) -> Option<ParsedFields> {
        let line = raw.get(RAW_LINE_FIELD)?.as_str()?.trim();
        let caps = line_regex().captures(line)?;

        let message = caps.name("message")?.as_str().trim_end();
        let mut fields = ParsedFields::new(raw.provenance.clone());
        fields.timestamp = Some(Value::String(caps.name("ts")?.as_str().to_string()));
        fields.level = Some(caps.name("level")?.as_str().to_ascii_uppercase());
        fields.service = Some(caps.name("service")?.as_str().to_string());
        fields.duration = duration_suffix(message).map(Value::from);
        fields.message = Some(message.to_string());
        Some(fields)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Text
    }
}
