//! Located JSON decoding for upstream weather documents.
//!
//! A decode failure names the JSON path, the line/column, and a short snippet
//! of the offending line so an operator can tell a schema change from a
//! truncated body without re-fetching.

use serde::de::DeserializeOwned;

/// Upstream body could not be decoded into the expected document shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}{detail} (line {line} col {column})\n{snippet}", path_prefix(.path))]
pub struct DecodeError {
    /// serde path to the failing field, empty when the failure is at the root.
    pub path: String,
    pub detail: String,
    pub line: usize,
    pub column: usize,
    pub snippet: String,
}

fn path_prefix(path: &str) -> String {
    if path.is_empty() || path == "." {
        String::new()
    } else {
        format!("at path '{path}': ")
    }
}

/// Decode `body` as `T`, reporting where decoding failed.
pub fn decode_with_context<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

        DecodeError {
            path: err.path().to_string(),
            detail: describe_mismatch(msg),
            line,
            column,
            snippet: snippet_around(&String::from_utf8_lossy(body), line, column, 20),
        }
    })
}

/// Turn "invalid type: X, expected Y" into "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {}, got {}", expected.trim(), actual);
    }
    msg.to_string()
}

fn snippet_around(body: &str, line: usize, column: usize, width: usize) -> String {
    let target: Vec<char> = body
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .chars()
        .collect();
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    // serde columns are 1-based; clamp to the line for truncated bodies.
    let idx = column.saturating_sub(1).min(target.len() - 1);
    let half = width / 2;
    let start = idx.saturating_sub(half);
    let end = (idx + half).min(target.len());

    let slice: String = target[start..end].iter().collect();
    let marker = " ".repeat(idx - start) + "^";
    format!("...{slice}...\n   {marker}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::models::Current;

    #[test]
    fn describes_type_mismatch_expected_first() {
        assert_eq!(
            describe_mismatch("invalid type: string \"hot\", expected f64"),
            "expected f64, got string \"hot\""
        );
        assert_eq!(describe_mismatch("EOF while parsing"), "EOF while parsing");
    }

    #[test]
    fn reports_path_of_bad_field() {
        let body = br#"{"main": {"temp": "hot"}}"#;
        let err = decode_with_context::<Current>(body).unwrap_err();
        assert_eq!(err.path, "main.temp");
        assert!(err.detail.starts_with("expected f64"), "{}", err.detail);
        assert!(err.to_string().contains("at path 'main.temp'"));
    }

    #[test]
    fn truncated_body_is_an_error_without_panicking() {
        let body = br#"{"main": {"temp": 72.5"#;
        let err = decode_with_context::<Current>(body).unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.snippet.contains('^'));
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = decode_with_context::<Current>(br#""sunny""#).unwrap_err();
        assert!(err.path.is_empty() || err.path == ".");
        assert!(!err.to_string().starts_with("at path"));
    }

    #[test]
    fn snippet_handles_multibyte_text() {
        let body = "{\"name\": \"Nouvelle-Orléans\", \"main\": \"warm\"}";
        let err = decode_with_context::<Current>(body.as_bytes()).unwrap_err();
        assert_eq!(err.path, "main");
        assert!(err.snippet.starts_with("..."));
    }
}
