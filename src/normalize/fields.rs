//! Per-field normalizers for level, service, message, duration and identifiers.

use super::NormalizationError;
use crate::schema::Severity;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const MAX_SERVICE_LEN: usize = 128;
pub const MAX_MESSAGE_LEN: usize = 2048;
pub const MAX_ERROR_CODE_LEN: usize = 64;
pub const MAX_REQUEST_ID_LEN: usize = 128;
pub const MESSAGE_HASH_LEN: usize = 16;

/// Known level tokens and synonyms. `None` for anything unrecognized.
pub fn normalize_level(raw: &str) -> Option<Severity> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => Some(Severity::Debug),
        "INFO" => Some(Severity::Info),
        "WARNING" | "WARN" => Some(Severity::Warning),
        "ERROR" | "ERR" => Some(Severity::Error),
        "CRITICAL" | "CRIT" | "FATAL" => Some(Severity::Critical),
        _ => None,
    }
}

/// Lower-case, trim, truncate, then keep only `[a-z0-9_-]`.
pub fn normalize_service(raw: &str) -> Result<String, NormalizationError> {
    let service: String = raw
        .to_lowercase()
        .trim()
        .chars()
        .take(MAX_SERVICE_LEN)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect();
    if service.is_empty() {
        return Err(NormalizationError::EmptyService(raw.to_string()));
    }
    Ok(service)
}

/// Collapse whitespace, truncate, and hash. Returns (message, hash).
pub fn normalize_message(raw: &str) -> Result<(String, String), NormalizationError> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let message: String = collapsed.chars().take(MAX_MESSAGE_LEN).collect();
    if message.is_empty() {
        return Err(NormalizationError::EmptyMessage);
    }
    let hash = message_hash(&message);
    Ok((message, hash))
}

/// First 16 hex chars of the SHA-256 of the normalized message.
pub fn message_hash(message: &str) -> String {
    let mut h = Sha256::new();
    h.update(message.as_bytes());
    let mut hex = format!("{:x}", h.finalize());
    hex.truncate(MESSAGE_HASH_LEN);
    hex
}

/// Milliseconds from a number or numeric string. Non-positive or unparseable → `None`.
pub fn normalize_duration(value: Option<&Value>) -> Option<f64> {
    let ms = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (ms.is_finite() && ms > 0.0).then_some(ms)
}

/// Trim and cap an optional identifier; empty becomes `None`.
pub fn normalize_identifier(raw: Option<&str>, max_len: usize) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_len).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_synonyms() {
        assert_eq!(normalize_level(" warn "), Some(Severity::Warning));
        assert_eq!(normalize_level("Err"), Some(Severity::Error));
        assert_eq!(normalize_level("FATAL"), Some(Severity::Critical));
        assert_eq!(normalize_level("crit"), Some(Severity::Critical));
        assert_eq!(normalize_level("debug"), Some(Severity::Debug));
        assert_eq!(normalize_level("NOTICE"), None);
        assert_eq!(normalize_level(""), None);
    }

    #[test]
    fn service_is_sanitized() {
        assert_eq!(normalize_service("  API-Server ").unwrap(), "api-server");
        assert_eq!(normalize_service("auth.v2/Login").unwrap(), "authv2login");
        assert_eq!(normalize_service("billing_core").unwrap(), "billing_core");
        assert!(matches!(normalize_service("..."), Err(NormalizationError::EmptyService(_))));
        assert!(matches!(normalize_service("   "), Err(NormalizationError::EmptyService(_))));
    }

    #[test]
    fn service_truncates_before_stripping() {
        let raw = format!("{}{}", "a".repeat(127), "!bcd");
        assert_eq!(normalize_service(&raw).unwrap(), "a".repeat(127));
    }

    #[test]
    fn message_collapse_and_hash() {
        let (m, h) = normalize_message("  connection\n\treset   by peer ").unwrap();
        assert_eq!(m, "connection reset by peer");
        assert_eq!(h.len(), MESSAGE_HASH_LEN);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));

        let (_, h2) = normalize_message("connection reset by peer").unwrap();
        assert_eq!(h, h2);
        assert_eq!(message_hash("abc"), "ba7816bf8f01cfea");
    }

    #[test]
    fn message_is_truncated() {
        let (m, _) = normalize_message(&"x".repeat(5000)).unwrap();
        assert_eq!(m.chars().count(), MAX_MESSAGE_LEN);
        assert!(matches!(normalize_message(" \n "), Err(NormalizationError::EmptyMessage)));
    }

    #[test]
    fn duration_coercion() {
        assert_eq!(normalize_duration(Some(&json!(250))), Some(250.0));
        assert_eq!(normalize_duration(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(normalize_duration(Some(&json!(0))), None);
        assert_eq!(normalize_duration(Some(&json!(-3))), None);
        assert_eq!(normalize_duration(Some(&json!("fast"))), None);
        assert_eq!(normalize_duration(Some(&json!("inf"))), None);
        assert_eq!(normalize_duration(None), None);
    }

    #[test]
    fn identifiers_are_capped() {
        let long = "e".repeat(100);
        assert_eq!(normalize_identifier(Some(&long), MAX_ERROR_CODE_LEN).unwrap().len(), 64);
        assert_eq!(normalize_identifier(Some("  "), MAX_ERROR_CODE_LEN), None);
        assert_eq!(normalize_identifier(Some(" E42 "), MAX_ERROR_CODE_LEN).as_deref(), Some("E42"));
    }
}
