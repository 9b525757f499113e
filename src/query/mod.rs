//! Named SQL query lifecycle
//!
//! Service Layer has no ad-hoc query endpoint. A parameterized SQL statement
//! must first be stored as a named `SQLQueries` resource, then listed through
//! `SQLQueries('<code>')/List`, then removed again.
//!
//! The `EphemeralQueryManager` owns that lifecycle for one stream run:
//! - a stale query left by a crashed run is deleted and the create retried once
//! - the query is deleted after paging, whether paging succeeded or failed
//! - if the run is cancelled mid-flight, a drop guard schedules the delete

mod manager;
mod types;

pub use manager::{delete_query, is_query_conflict, EphemeralQueryManager, QUERY_EXISTS_CODE};
pub use types::{QueryDefinition, QueryLifecycle, QueryPhase, QueryRun};
