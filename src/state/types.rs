//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete persisted state of the tap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, Bookmark>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bookmark of a stream
    pub fn get_bookmark(&self, stream: &str) -> Option<&Bookmark> {
        self.bookmarks.get(stream)
    }

    /// Get the bookmark value of a stream
    pub fn get_value(&self, stream: &str) -> Option<&str> {
        self.bookmarks.get(stream)?.replication_key_value.as_deref()
    }

    /// Record the high-water mark of a stream
    pub fn set_bookmark(&mut self, stream: &str, replication_key: &str, value: String) {
        self.bookmarks.insert(
            stream.to_string(),
            Bookmark {
                replication_key: Some(replication_key.to_string()),
                replication_key_value: Some(value),
            },
        );
    }
}

/// High-water mark of one stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Field the value was taken from
    #[serde(default)]
    pub replication_key: Option<String>,

    /// Latest replication key value of a completed sync
    #[serde(default)]
    pub replication_key_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.bookmarks.is_empty());
        assert!(state.get_value("invoices").is_none());
    }

    #[test]
    fn test_set_bookmark() {
        let mut state = State::new();
        state.set_bookmark("invoices", "UpdateDate", "2024-01-01".to_string());

        assert_eq!(state.get_value("invoices"), Some("2024-01-01"));
        assert_eq!(
            state
                .get_bookmark("invoices")
                .and_then(|b| b.replication_key.as_deref()),
            Some("UpdateDate")
        );
    }

    #[test]
    fn test_state_serialization_shape() {
        let mut state = State::new();
        state.set_bookmark("invoices", "UpdateDate", "2024-03-01".to_string());

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "bookmarks": {
                    "invoices": {
                        "replication_key": "UpdateDate",
                        "replication_key_value": "2024-03-01"
                    }
                }
            })
        );
    }

    #[test]
    fn test_state_tolerates_unknown_and_missing_fields() {
        let state: State =
            serde_json::from_str(r#"{"bookmarks": {"invoices": {}}, "currently_syncing": null}"#)
                .unwrap();
        assert!(state.get_value("invoices").is_none());

        let empty: State = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, State::new());
    }
}
