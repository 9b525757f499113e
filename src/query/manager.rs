//! Ephemeral query manager
//!
//! Create, list and delete a named SQL query for the duration of one run.

use super::types::{resource_path, QueryDefinition, QueryLifecycle, QueryPhase, QueryRun, SQL_QUERIES_PATH};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use reqwest::Response;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Backend error code returned when a query code is already taken
pub const QUERY_EXISTS_CODE: i64 = -2035;

/// Check whether an error is the server reporting a duplicate query code.
///
/// Service Layer answers with HTTP 400 and a body like
/// `{"error": {"code": -2035, "message": {...}}}`. Some versions send the
/// code as a string.
pub fn is_query_conflict(error: &Error) -> bool {
    let Error::UnexpectedResponse { status: 400, body } = error else {
        return false;
    };

    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return false;
    };

    match parsed.pointer("/error/code") {
        Some(Value::Number(n)) => n.as_i64() == Some(QUERY_EXISTS_CODE),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok() == Some(QUERY_EXISTS_CODE),
        _ => false,
    }
}

/// Delete the named query `code`.
///
/// A query that does not exist counts as deleted.
pub async fn delete_query(client: &HttpClient, code: &str) -> Result<()> {
    match client.delete(&resource_path(code)).await {
        Ok(_) => {
            debug!("Deleted SQL query '{code}'");
            Ok(())
        }
        Err(Error::UnexpectedResponse { status: 404, .. }) => {
            debug!("SQL query '{code}' was already absent");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Manages the server-side lifecycle of named SQL queries
#[derive(Debug, Clone)]
pub struct EphemeralQueryManager {
    client: Arc<HttpClient>,
}

impl EphemeralQueryManager {
    /// Create a manager over an authenticated client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// The client used for query requests
    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }

    /// Store a named query on the server.
    ///
    /// A duplicate code is reported as `Error::QueryAlreadyExists`.
    pub async fn create(&self, definition: &QueryDefinition) -> Result<Response> {
        match self.client.post(SQL_QUERIES_PATH, definition.to_body()).await {
            Ok(response) => {
                debug!("Created SQL query '{}'", definition.code);
                Ok(response)
            }
            Err(e) if is_query_conflict(&e) => Err(Error::QueryAlreadyExists {
                code: definition.code.clone(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Remove a named query. Missing queries are not an error.
    pub async fn delete(&self, code: &str) -> Result<()> {
        delete_query(&self.client, code).await
    }

    /// Create the query, run `paging` against it, and delete it again.
    ///
    /// Returns the result of `paging`, or the error that prevented it from
    /// running. The query is deleted on every path.
    pub async fn invoke_and_paginate<T, F, Fut>(
        &self,
        definition: &QueryDefinition,
        paging: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.invoke_and_paginate_traced(definition, paging)
            .await
            .outcome
    }

    /// Same as [`invoke_and_paginate`](Self::invoke_and_paginate), also
    /// returning the phases the invocation went through.
    pub async fn invoke_and_paginate_traced<T, F, Fut>(
        &self,
        definition: &QueryDefinition,
        paging: F,
    ) -> QueryRun<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let code = definition.code.as_str();
        let mut lifecycle = QueryLifecycle::new(code);
        let guard = CleanupGuard::arm(self.client.clone(), code);

        if let Err(e) = self.create_with_recovery(definition, &mut lifecycle).await {
            lifecycle.advance(QueryPhase::Failed);
            self.final_delete(code, &mut lifecycle).await;
            guard.disarm();
            return QueryRun {
                outcome: Err(e),
                trace: lifecycle.into_trace(),
            };
        }

        lifecycle.advance(QueryPhase::Created);
        lifecycle.advance(QueryPhase::Paging);
        let outcome = paging().await;
        lifecycle.advance(if outcome.is_ok() {
            QueryPhase::Succeeded
        } else {
            QueryPhase::Failed
        });

        self.final_delete(code, &mut lifecycle).await;
        guard.disarm();

        QueryRun {
            outcome,
            trace: lifecycle.into_trace(),
        }
    }

    /// Create the query, replacing a stale copy at most once
    async fn create_with_recovery(
        &self,
        definition: &QueryDefinition,
        lifecycle: &mut QueryLifecycle,
    ) -> Result<()> {
        lifecycle.advance(QueryPhase::Creating);
        match self.create(definition).await {
            Ok(_) => return Ok(()),
            Err(Error::QueryAlreadyExists { .. }) if lifecycle.can_retry_create() => {}
            Err(e) => return Err(e),
        }

        lifecycle.advance(QueryPhase::ConflictDetected);
        warn!(
            "SQL query '{}' already exists, removing stale copy",
            definition.code
        );

        lifecycle.advance(QueryPhase::Deleting);
        if let Err(e) = self.delete(&definition.code).await {
            warn!("Failed to remove stale SQL query '{}': {e}", definition.code);
        }

        lifecycle.advance(QueryPhase::Creating);
        match self.create(definition).await {
            Ok(_) => {
                info!("Recreated SQL query '{}'", definition.code);
                Ok(())
            }
            Err(Error::QueryAlreadyExists { code }) => {
                Err(Error::QueryConflictUnrecoverable { code })
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the query, logging instead of failing
    async fn final_delete(&self, code: &str, lifecycle: &mut QueryLifecycle) {
        lifecycle.advance(QueryPhase::Deleting);
        if let Err(e) = self.delete(code).await {
            warn!("Failed to delete SQL query '{code}': {e}");
        }
        lifecycle.advance(QueryPhase::Done);
    }
}

/// Deletes the query if the invocation is dropped before it finishes
struct CleanupGuard {
    client: Arc<HttpClient>,
    code: Option<String>,
}

impl CleanupGuard {
    fn arm(client: Arc<HttpClient>, code: &str) -> Self {
        Self {
            client,
            code: Some(code.to_string()),
        }
    }

    fn disarm(mut self) {
        self.code = None;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };

        warn!("Query run for '{code}' was cancelled, scheduling delete");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move {
                    if let Err(e) = delete_query(&client, &code).await {
                        warn!("Failed to delete SQL query '{code}' after cancellation: {e}");
                    }
                });
            }
            Err(_) => warn!("No runtime available, SQL query '{code}' left on the server"),
        }
    }
}
