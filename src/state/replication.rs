//! Incremental replication bounds
//!
//! Turns stored bookmarks into the lower bound of a stream's first request.

use super::manager::StateManager;
use crate::types::{format_date, parse_date};
use tracing::{debug, warn};

/// Resolves where an incremental stream starts
#[derive(Debug, Clone)]
pub struct ReplicationState {
    state: StateManager,
    /// Configured global lower bound, used when a stream has no bookmark
    start_date: Option<String>,
}

impl ReplicationState {
    /// Create a replication state over persisted bookmarks
    pub fn new(state: StateManager, start_date: Option<String>) -> Self {
        Self { state, start_date }
    }

    /// The underlying state manager
    pub fn manager(&self) -> &StateManager {
        &self.state
    }

    /// Starting value of a stream, formatted `YYYY-MM-DD`.
    ///
    /// Streams without a replication key always run a full extraction and get
    /// `None`. Otherwise the stored bookmark wins over the configured
    /// `start_date`.
    pub async fn starting_value(
        &self,
        stream: &str,
        replication_key: Option<&str>,
    ) -> Option<String> {
        replication_key?;

        if let Some(bookmark) = self.state.get_bookmark(stream).await {
            match parse_date(&bookmark) {
                Some(date) => return Some(format_date(date)),
                None => warn!(
                    "Ignoring unparseable bookmark '{bookmark}' for stream '{stream}'"
                ),
            }
        }

        let start = self.start_date.as_deref().and_then(parse_date).map(format_date);
        if start.is_none() {
            debug!("No bookmark or start_date for '{stream}', running full extraction");
        }
        start
    }

    /// First-page `$filter` expression for a stream, if it is incremental
    pub async fn first_page_filter(
        &self,
        stream: &str,
        replication_key: Option<&str>,
    ) -> Option<String> {
        let key = replication_key?;
        let start = self.starting_value(stream, Some(key)).await?;
        Some(format!("{key} ge '{start}'"))
    }
}

/// Check if replication value `candidate` is past `current`.
///
/// Two numeric values compare as numbers; anything else compares as text,
/// which orders ISO dates correctly.
pub fn is_after(candidate: &str, current: &str) -> bool {
    match (candidate.trim().parse::<f64>(), current.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a > b,
        _ => candidate > current,
    }
}
