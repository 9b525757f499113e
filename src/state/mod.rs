//! State management module
//!
//! Handles bookmark tracking and persistence between runs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Per-stream bookmarks as persisted JSON
//! - `StateManager` - File-based state persistence
//! - `ReplicationState` - First-page lower bound for incremental streams

mod manager;
mod replication;
mod types;

pub use manager::StateManager;
pub use replication::{is_after, ReplicationState};
pub use types::{Bookmark, State};
