//! Query definition and lifecycle state machine

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Collection of named queries on the Service Layer
pub const SQL_QUERIES_PATH: &str = "SQLQueries";

/// A named, server-persisted SQL query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Unique id (`SqlCode`)
    pub code: String,
    /// Display name (`SqlName`)
    pub name: String,
    /// Parameterized SQL (`SqlText`), parameters written as `:name`
    pub text: String,
}

impl QueryDefinition {
    /// Create a query definition
    pub fn new(code: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            text: text.into(),
        }
    }

    /// Path of the query resource, e.g. `SQLQueries('Q1')`
    pub fn resource_path(&self) -> String {
        resource_path(&self.code)
    }

    /// Path that runs the query and lists its rows
    pub fn list_path(&self) -> String {
        format!("{}/List", self.resource_path())
    }

    /// Body of the create request
    pub fn to_body(&self) -> Value {
        json!({
            "SqlCode": self.code,
            "SqlName": self.name,
            "SqlText": self.text,
        })
    }
}

/// Resource path for a query code, with OData quote escaping
pub(crate) fn resource_path(code: &str) -> String {
    format!("{SQL_QUERIES_PATH}('{}')", code.replace('\'', "''"))
}

/// Phases of one query invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    /// Nothing attempted yet
    Idle,
    /// Create request in flight
    Creating,
    /// Server reported the code already exists
    ConflictDetected,
    /// Query exists and is ready to list
    Created,
    /// Paging loop running
    Paging,
    /// Paging loop finished
    Succeeded,
    /// Create or paging failed
    Failed,
    /// Delete request in flight
    Deleting,
    /// Query removed (or removal attempted); terminal
    Done,
}

impl QueryPhase {
    /// Check whether `next` may follow this phase
    pub fn can_advance_to(self, next: QueryPhase) -> bool {
        use QueryPhase::*;
        matches!(
            (self, next),
            (Idle, Creating)
                | (Creating, Created | ConflictDetected | Failed)
                | (ConflictDetected, Deleting)
                | (Deleting, Creating | Done)
                | (Created, Paging)
                | (Paging, Succeeded | Failed)
                | (Succeeded | Failed, Deleting)
        )
    }
}

/// Tracks the phase of one invocation and the path it took.
///
/// The retry after a conflict is bounded: only one `Deleting -> Creating`
/// transition is accepted.
#[derive(Debug, Clone)]
pub struct QueryLifecycle {
    code: String,
    phase: QueryPhase,
    trace: Vec<QueryPhase>,
    create_attempts: u8,
}

impl QueryLifecycle {
    /// Start a lifecycle in `Idle`
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            phase: QueryPhase::Idle,
            trace: vec![QueryPhase::Idle],
            create_attempts: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    /// Number of create attempts so far
    pub fn create_attempts(&self) -> u8 {
        self.create_attempts
    }

    /// Whether a failed create may still be retried
    pub fn can_retry_create(&self) -> bool {
        self.create_attempts < 2
    }

    /// Move to `next`
    pub fn advance(&mut self, next: QueryPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid query transition {:?} -> {:?}",
            self.phase,
            next
        );
        if next == QueryPhase::Creating {
            self.create_attempts += 1;
            debug_assert!(self.create_attempts <= 2, "create retried more than once");
        }
        debug!("SQL query '{}': {:?} -> {:?}", self.code, self.phase, next);
        self.phase = next;
        self.trace.push(next);
    }

    /// Every phase visited, in order
    pub fn trace(&self) -> &[QueryPhase] {
        &self.trace
    }

    /// Consume the lifecycle, returning its trace
    pub fn into_trace(self) -> Vec<QueryPhase> {
        self.trace
    }
}

/// Outcome of one invocation together with the phases it went through
#[derive(Debug)]
pub struct QueryRun<T> {
    /// Paging result, or the first failure
    pub outcome: Result<T>,
    /// Phases visited; always ends in `Done`
    pub trace: Vec<QueryPhase>,
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_paths() {
        let def = QueryDefinition::new("TapInvoiceDetails", "Invoice details", "SELECT 1");
        assert_eq!(def.resource_path(), "SQLQueries('TapInvoiceDetails')");
        assert_eq!(def.list_path(), "SQLQueries('TapInvoiceDetails')/List");
    }

    #[test]
    fn test_code_quotes_are_escaped() {
        assert_eq!(resource_path("it's"), "SQLQueries('it''s')");
    }

    #[test]
    fn test_body() {
        let def = QueryDefinition::new("Q", "Name", "SELECT * FROM OITM");
        assert_eq!(
            def.to_body(),
            json!({"SqlCode": "Q", "SqlName": "Name", "SqlText": "SELECT * FROM OITM"})
        );
    }

    #[test]
    fn test_happy_path_transitions() {
        use QueryPhase::*;
        let path = [Idle, Creating, Created, Paging, Succeeded, Deleting, Done];
        assert!(path.windows(2).all(|w| w[0].can_advance_to(w[1])));
    }

    #[test]
    fn test_invalid_transitions() {
        use QueryPhase::*;
        assert!(!Idle.can_advance_to(Paging));
        assert!(!Created.can_advance_to(Done));
        assert!(!Done.can_advance_to(Creating));
        assert!(!ConflictDetected.can_advance_to(Creating));
    }

    #[test]
    fn test_lifecycle_counts_create_attempts() {
        use QueryPhase::*;
        let mut lc = QueryLifecycle::new("Q");
        lc.advance(Creating);
        assert!(lc.can_retry_create());
        lc.advance(ConflictDetected);
        lc.advance(Deleting);
        lc.advance(Creating);
        assert_eq!(lc.create_attempts(), 2);
        assert!(!lc.can_retry_create());
        lc.advance(Created);
        assert_eq!(lc.phase(), Created);
        assert_eq!(
            lc.trace(),
            [Idle, Creating, ConflictDetected, Deleting, Creating, Created]
        );
    }
}
