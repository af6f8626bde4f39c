//! JSON source: newline-delimited objects, or a single top-level array of objects.
//!
//! The first significant byte of the file selects the layout. Anything other than
//! `[` is read as NDJSON; `[` switches to streaming the array element by element,
//! so neither layout holds more than one element in memory.

use super::{ensure_exists, IngestionError, RawRecord};
use crate::schema::{Provenance, SourceFormat};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Bytes, Read};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const PREVIEW_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonLayout {
    Lines,
    Array,
}

pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn open(path: &Path) -> Result<Self, IngestionError> {
        ensure_exists(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a fresh pass over the file.
    pub fn records(&self) -> Result<JsonRecords, IngestionError> {
        let layout = self.detect_layout()?;
        let file = File::open(&self.path).map_err(|e| IngestionError::io(&self.path, e))?;
        let reader = BufReader::new(file);
        let mode = match layout {
            JsonLayout::Lines => Mode::Lines {
                reader,
                buf: Vec::new(),
                line_no: 0,
            },
            JsonLayout::Array => Mode::Array(ArrayElements::new(reader)),
        };
        trace!(source = %self.path.display(), ?layout, "json layout selected");
        Ok(JsonRecords {
            mode,
            path: self.path.clone(),
            source: self.path.display().to_string(),
            yielded: 0,
            finished: false,
        })
    }

    fn detect_layout(&self) -> Result<JsonLayout, IngestionError> {
        let file = File::open(&self.path).map_err(|e| IngestionError::io(&self.path, e))?;
        let mut reader = BufReader::new(file);
        let first = first_significant_byte(&mut reader).map_err(|e| IngestionError::io(&self.path, e))?;
        Ok(match first {
            Some(b'[') => JsonLayout::Array,
            _ => JsonLayout::Lines,
        })
    }
}

fn first_significant_byte<R: BufRead>(reader: &mut R) -> std::io::Result<Option<u8>> {
    let mut at_start = true;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        if at_start && buf.starts_with(&UTF8_BOM) {
            reader.consume(UTF8_BOM.len());
            at_start = false;
            continue;
        }
        at_start = false;
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(i) => return Ok(Some(buf[i])),
            None => {
                let n = buf.len();
                reader.consume(n);
            }
        }
    }
}

enum Mode {
    Lines {
        reader: BufReader<File>,
        buf: Vec<u8>,
        line_no: u64,
    },
    Array(ArrayElements<BufReader<File>>),
}

pub struct JsonRecords {
    mode: Mode,
    path: PathBuf,
    source: String,
    yielded: u64,
    finished: bool,
}

impl JsonRecords {
    fn provenance(&self, index: u64) -> Provenance {
        Provenance {
            source: self.source.clone(),
            index,
            format: SourceFormat::Json,
        }
    }

    /// Next well-formed object, or `Ok(None)` once the input is exhausted.
    fn next_object(&mut self) -> Result<Option<RawRecord>, IngestionError> {
        loop {
            let (index, bytes) = match &mut self.mode {
                Mode::Lines { reader, buf, line_no } => {
                    buf.clear();
                    let n = reader
                        .read_until(b'\n', buf)
                        .map_err(|e| IngestionError::io(&self.path, e))?;
                    if n == 0 {
                        return Ok(None);
                    }
                    *line_no += 1;
                    let mut line: &[u8] = buf;
                    if *line_no == 1 {
                        line = line.strip_prefix(&UTF8_BOM[..]).unwrap_or(line);
                    }
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    (*line_no, line.to_vec())
                }
                Mode::Array(elements) => match elements
                    .next_element()
                    .map_err(|e| IngestionError::io(&self.path, e))?
                {
                    None => return Ok(None),
                    Some(el) => (elements.index, el),
                },
            };

            match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => {
                    return Ok(Some(RawRecord {
                        fields: map.into_iter().collect(),
                        provenance: self.provenance(index),
                    }));
                }
                Ok(other) => {
                    warn!(
                        source = %self.source,
                        index,
                        kind = json_kind(&other),
                        "skipping non-object json entry"
                    );
                }
                Err(e) => {
                    warn!(
                        source = %self.source,
                        index,
                        error = %e,
                        preview = %preview(&bytes),
                        "skipping malformed json entry"
                    );
                }
            }
        }
    }
}

impl Iterator for JsonRecords {
    type Item = Result<RawRecord, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_object() {
            Ok(Some(record)) => {
                self.yielded += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.finished = true;
                if self.yielded == 0 {
                    Some(Err(IngestionError::EmptyJson(self.path.clone())))
                } else {
                    None
                }
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim().chars().take(PREVIEW_LEN).collect()
}

/// Splits a top-level JSON array into raw element byte slices without parsing
/// the whole document. Tracks string/escape state and nesting depth so commas
/// and brackets inside elements are not mistaken for separators.
pub(crate) struct ArrayElements<R: Read> {
    bytes: Bytes<R>,
    started: bool,
    done: bool,
    /// 1-based ordinal of the last returned element
    pub(crate) index: u64,
}

impl<R: Read> ArrayElements<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes(),
            started: false,
            done: false,
            index: 0,
        }
    }

    fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        self.bytes.next().transpose()
    }

    /// Next non-blank element. A truncated trailing element is returned as-is
    /// and fails to parse downstream.
    pub(crate) fn next_element(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            match self.next_raw()? {
                None => return Ok(None),
                Some(el) if el.iter().all(u8::is_ascii_whitespace) => continue,
                Some(el) => {
                    self.index += 1;
                    return Ok(Some(el));
                }
            }
        }
    }

    fn next_raw(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        if !self.started {
            loop {
                match self.next_byte()? {
                    Some(b'[') => break,
                    Some(b) if b.is_ascii_whitespace() || UTF8_BOM.contains(&b) => continue,
                    _ => {
                        self.done = true;
                        return Ok(None);
                    }
                }
            }
            self.started = true;
        }

        let mut buf = Vec::new();
        let mut depth = 0u32;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let Some(b) = self.next_byte()? else {
                self.done = true;
                return Ok(Some(buf));
            };
            if in_string {
                buf.push(b);
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            match b {
                b'"' => {
                    in_string = true;
                    buf.push(b);
                }
                b'{' | b'[' => {
                    depth += 1;
                    buf.push(b);
                }
                b'}' | b']' if depth > 0 => {
                    depth -= 1;
                    buf.push(b);
                }
                b']' => {
                    self.done = true;
                    return Ok(Some(buf));
                }
                b',' if depth == 0 => return Ok(Some(buf)),
                _ => buf.push(b),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        (dir, path)
    }

    fn collect(path: &Path) -> Vec<Result<RawRecord, IngestionError>> {
        JsonSource::open(path).unwrap().records().unwrap().collect()
    }

    #[test]
    fn ndjson_skips_malformed_lines() {
        let (_dir, path) = write_file(
            "{\"msg\":\"a\"}\n{not json}\n\n[1,2]\n{\"msg\":\"b\"}\n",
        );
        let records: Vec<RawRecord> = collect(&path).into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("msg").unwrap(), "a");
        assert_eq!(records[0].provenance.index, 1);
        assert_eq!(records[1].provenance.index, 5);
    }

    #[test]
    fn array_layout_streams_objects() {
        let (_dir, path) = write_file(
            r#"  [ {"msg": "a, [still] a", "n": {"x": [1,2]}}, 42, {"msg":"b\"}"} ]"#,
        );
        let records: Vec<RawRecord> = collect(&path).into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("msg").unwrap(), "a, [still] a");
        assert_eq!(records[0].provenance.index, 1);
        assert_eq!(records[1].get("msg").unwrap(), "b\"}");
        assert_eq!(records[1].provenance.index, 3);
    }

    #[test]
    fn empty_input_is_fatal() {
        for content in ["", "   \n", "[]", "{broken\n", "[1, 2, \"x\"]"] {
            let (_dir, path) = write_file(content);
            let items = collect(&path);
            assert_eq!(items.len(), 1, "content {content:?}");
            assert!(matches!(items[0], Err(IngestionError::EmptyJson(_))));
        }
    }

    #[test]
    fn truncated_array_keeps_complete_elements() {
        let (_dir, path) = write_file(r#"[{"msg":"a"}, {"msg": "b"#);
        let records: Vec<RawRecord> = collect(&path).into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn bom_prefixed_array() {
        let (_dir, path) = write_file("\u{feff}[{\"msg\":\"a\"}]");
        let records: Vec<RawRecord> = collect(&path).into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
    }
}
