//! Plain text source: one record per non-empty line.

use super::{ensure_exists, IngestionError, RawRecord};
use crate::schema::{Provenance, SourceFormat};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

const UTF8_BOM: &str = "\u{feff}";

pub struct TextSource {
    path: PathBuf,
}

impl TextSource {
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
    pub fn records(&self) -> Result<TextRecords, IngestionError> {
        let file = File::open(&self.path).map_err(|e| IngestionError::io(&self.path, e))?;
        Ok(TextRecords {
            reader: BufReader::new(file),
            path: self.path.clone(),
            source: self.path.display().to_string(),
            buf: Vec::new(),
            line_no: 0,
            done: false,
        })
    }
}

pub struct TextRecords {
    reader: BufReader<File>,
    path: PathBuf,
    source: String,
    buf: Vec<u8>,
    line_no: u64,
    done: bool,
}

impl Iterator for TextRecords {
    type Item = Result<RawRecord, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_no += 1;
                    let line = match std::str::from_utf8(&self.buf) {
                        Ok(s) => s,
                        Err(_) => {
                            warn!(source = %self.source, line = self.line_no, "skipping non-UTF-8 line");
                            continue;
                        }
                    };
                    let line = if self.line_no == 1 {
                        line.trim_start_matches(UTF8_BOM)
                    } else {
                        line
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        trace!(source = %self.source, line = self.line_no, "skipping empty line");
                        continue;
                    }
                    let provenance = Provenance {
                        source: self.source.clone(),
                        index: self.line_no,
                        format: SourceFormat::Text,
                    };
                    return Some(Ok(RawRecord::text_line(line, provenance)));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(IngestionError::io(&self.path, e)));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RAW_LINE_FIELD;
    use std::io::Write;

    fn write_file(content: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::File::create(&path).unwrap().write_all(content).unwrap();
        (dir, path)
    }

    #[test]
    fn yields_non_empty_lines_with_line_numbers() {
        let (_dir, path) = write_file(b"first line\n\n   \nsecond line\r\n");
        let source = TextSource::open(&path).unwrap();
        let records: Vec<_> = source.records().unwrap().map(Result::unwrap).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get(RAW_LINE_FIELD).unwrap(), "first line");
        assert_eq!(records[0].provenance.index, 1);
        assert_eq!(records[1].get(RAW_LINE_FIELD).unwrap(), "second line");
        assert_eq!(records[1].provenance.index, 4);
    }

    #[test]
    fn restartable_per_call() {
        let (_dir, path) = write_file(b"a\nb\n");
        let source = TextSource::open(&path).unwrap();
        let first: Vec<_> = source.records().unwrap().take(1).collect();
        let all: Vec<_> = source.records().unwrap().collect();
        assert_eq!(first.len(), 1);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn skips_invalid_utf8_and_bom() {
        let (_dir, path) = write_file(b"\xEF\xBB\xBFhello\n\xFF\xFE bad\nworld");
        let source = TextSource::open(&path).unwrap();
        let lines: Vec<String> = source
            .records()
            .unwrap()
            .map(|r| r.unwrap().get(RAW_LINE_FIELD).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(lines, vec!["hello", "world"]);
    }
}
