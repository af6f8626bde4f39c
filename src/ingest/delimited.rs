//! CSV source. The first row is a required header naming the fields.

use super::{ensure_exists, IngestionError, RawRecord};
use crate::schema::{Provenance, SourceFormat};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const UTF8_BOM: char = '\u{feff}';

pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvSource {
    pub fn open(path: &Path) -> Result<Self, IngestionError> {
        ensure_exists(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            delimiter: b',',
        })
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> Result<csv::Reader<File>, IngestionError> {
        let file = File::open(&self.path).map_err(|e| IngestionError::io(&self.path, e))?;
        Ok(ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(file))
    }

    fn read_headers(&self, reader: &mut csv::Reader<File>) -> Result<Vec<String>, IngestionError> {
        let record = reader.headers().map_err(|e| IngestionError::Csv {
            path: self.path.clone(),
            source: e,
        })?;
        if record.iter().all(|h| h.trim().is_empty()) {
            return Err(IngestionError::MissingCsvHeader(self.path.clone()));
        }
        Ok(record
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches(UTF8_BOM) } else { h };
                h.trim().to_string()
            })
            .collect())
    }

    /// Header names, BOM-stripped and trimmed. Used to validate a column mapping.
    pub fn headers(&self) -> Result<Vec<String>, IngestionError> {
        let mut reader = self.reader()?;
        self.read_headers(&mut reader)
    }

    /// Start a fresh pass over the file.
    pub fn records(&self) -> Result<CsvRecords, IngestionError> {
        let mut reader = self.reader()?;
        let headers = self.read_headers(&mut reader)?;
        Ok(CsvRecords {
            rows: reader.into_records(),
            headers,
            path: self.path.clone(),
            source: self.path.display().to_string(),
            row_no: 1,
            done: false,
        })
    }
}

pub struct CsvRecords {
    rows: StringRecordsIntoIter<File>,
    headers: Vec<String>,
    path: PathBuf,
    source: String,
    row_no: u64,
    done: bool,
}

impl CsvRecords {
    fn to_raw(&self, row: &StringRecord, index: u64) -> RawRecord {
        let fields = self
            .headers
            .iter()
            .zip(row.iter())
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.clone(), Value::String(v.to_string())))
            .collect();
        RawRecord {
            fields,
            provenance: Provenance {
                source: self.source.clone(),
                index,
                format: SourceFormat::Csv,
            },
        }
    }
}

/// 1-based file line of a row, falling back to the row ordinal when the
/// reader has no position for it.
fn row_line(position: Option<&csv::Position>, ordinal: u64) -> u64 {
    position.map(csv::Position::line).unwrap_or(ordinal)
}

impl Iterator for CsvRecords {
    type Item = Result<RawRecord, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let row = self.rows.next()?;
            self.row_no += 1;
            match row {
                Ok(row) => {
                    let index = row_line(row.position(), self.row_no);
                    if row.iter().all(|c| c.trim().is_empty()) {
                        debug!(source = %self.source, row = index, "skipping empty csv row");
                        continue;
                    }
                    return Some(Ok(self.to_raw(&row, index)));
                }
                Err(e) if e.is_io_error() => {
                    self.done = true;
                    return Some(Err(IngestionError::Csv {
                        path: self.path.clone(),
                        source: e,
                    }));
                }
                Err(e) => {
                    let line = row_line(e.position(), self.row_no);
                    warn!(source = %self.source, row = line, error = %e, "skipping malformed csv row");
                }
            }
        }
        None
    }
}
