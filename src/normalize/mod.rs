//! Normalization: loosely typed parser output → validated [`LogRecord`].
//!
//! A record fails only when timestamp, service or message cannot be produced.
//! Level and duration problems degrade: unknown levels become INFO, bad
//! durations become absent.

mod fields;
mod timestamp;

pub use fields::{
    message_hash, normalize_duration, normalize_identifier, normalize_level, normalize_message,
    normalize_service, MAX_ERROR_CODE_LEN, MAX_MESSAGE_LEN, MAX_REQUEST_ID_LEN, MAX_SERVICE_LEN,
    MESSAGE_HASH_LEN,
};
pub use timestamp::{normalize_timestamp, EPOCH_MILLIS_THRESHOLD};

use crate::parse::ParsedFields;
use crate::schema::{LogRecord, RecordParts, Severity};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("service name empty after sanitizing {0:?}")]
    EmptyService(String),

    #[error("empty message")]
    EmptyMessage,

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Validate one parsed record.
pub fn normalize_record(fields: ParsedFields) -> Result<LogRecord, NormalizationError> {
    let ts = fields
        .timestamp
        .as_ref()
        .ok_or(NormalizationError::MissingField("timestamp"))?;
    let timestamp = normalize_timestamp(ts)?;
    let service = normalize_service(
        fields
            .service
            .as_deref()
            .ok_or(NormalizationError::MissingField("service"))?,
    )?;
    let (message, message_hash) = normalize_message(
        fields
            .message
            .as_deref()
            .ok_or(NormalizationError::MissingField("message"))?,
    )?;

    let severity = match fields.level.as_deref() {
        Some(raw) => normalize_level(raw).unwrap_or_else(|| {
            warn!(source = %fields.provenance, value = raw, "unknown log level, defaulting to INFO");
            Severity::Info
        }),
        None => Severity::Info,
    };

    Ok(LogRecord::from_parts(RecordParts {
        timestamp,
        service,
        severity,
        message,
        message_hash,
        duration_ms: normalize_duration(fields.duration.as_ref()),
        error_code: normalize_identifier(fields.error_code.as_deref(), MAX_ERROR_CODE_LEN),
        request_id: normalize_identifier(fields.request_id.as_deref(), MAX_REQUEST_ID_LEN),
        provenance: fields.provenance,
    }))
}

/// Normalize every record, keeping input order. Returns (records, skipped).
pub fn normalize_batch(parsed: Vec<ParsedFields>) -> (Vec<LogRecord>, usize) {
    let mut records = Vec::with_capacity(parsed.len());
    let mut skipped = 0;
    for fields in parsed {
        let source = fields.provenance.clone();
        match normalize_record(fields) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!(source = %source, error = %e, "skipping record");
                skipped += 1;
            }
        }
    }
    (records, skipped)
}
