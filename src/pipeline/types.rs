//! Pipeline types
//!
//! Output messages and run statistics.

use crate::state::State;
use crate::types::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A message emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// One extracted record
    Record {
        /// Stream name
        stream: String,
        /// The record
        record: Record,
        /// When the record was extracted
        time_extracted: DateTime<Utc>,
    },
    /// Bookmarks after a stream completed
    State {
        /// Full persisted state
        value: Value,
    },
}

impl Message {
    /// Create a record message stamped with the current time
    pub fn record(stream: impl Into<String>, record: Record) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted: Utc::now(),
        }
    }

    /// Create a state message
    pub fn state(state: &State) -> Self {
        Self::State {
            value: serde_json::to_value(state).unwrap_or(Value::Null),
        }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Stream of a record message
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Record { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }
}

/// Statistics from a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Records emitted
    pub records_synced: usize,
    /// Requests that returned a page
    pub pages_fetched: usize,
    /// Stream runs completed, children counted once per parent record
    pub streams_synced: usize,
    /// Named queries created and removed
    pub queries_run: usize,
    /// Failed stream runs
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: usize) {
        self.records_synced += count;
    }

    /// Add pages
    pub fn add_pages(&mut self, count: usize) {
        self.pages_fetched += count;
    }

    /// Add a completed stream run
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a query run
    pub fn add_query(&mut self) {
        self.queries_run += 1;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
