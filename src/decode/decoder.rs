//! JSON record decoder

use crate::error::{Error, Result};
use crate::types::Record;
use serde_json::Value;
use tracing::warn;

/// Records path of Service Layer collection responses
pub const DEFAULT_RECORDS_PATH: &str = "$.value[*]";

/// JSON decoder with record path extraction
#[derive(Debug, Clone)]
pub struct JsonDecoder {
    /// JSONPath to extract records
    record_path: String,
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self::with_path(DEFAULT_RECORDS_PATH)
    }
}

impl JsonDecoder {
    /// Create a decoder for the standard `value` collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            record_path: path.into(),
        }
    }

    /// The configured record path
    pub fn path(&self) -> &str {
        &self.record_path
    }

    /// Extract the record objects from a response body.
    ///
    /// A path that matches nothing yields no records. Matches that are not
    /// JSON objects are skipped.
    pub fn decode(&self, body: &Value) -> Result<Vec<Record>> {
        let values = if self.record_path.contains('*') {
            extract_with_jsonpath(body, &self.record_path)?
        } else {
            match extract_simple_path(body, &self.record_path) {
                Some(Value::Array(arr)) => arr,
                Some(Value::Null) | None => vec![],
                Some(v) => vec![v],
            }
        };

        let mut records = Vec::with_capacity(values.len());
        let mut skipped = 0usize;
        for value in values {
            match value {
                Value::Object(map) => records.push(map),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(
                "Skipped {skipped} non-object values at '{}'",
                self.record_path
            );
        }

        Ok(records)
    }
}

/// Follow a dot-separated path (`$.a.b` or `a.b`)
fn extract_simple_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.trim_start_matches('$').trim_start_matches('.');
    if path.is_empty() {
        return Some(value.clone());
    }

    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}

/// Evaluate a wildcard JSONPath expression
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid JSONPath '{path}': {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
