//! Stream extractor
//!
//! One extractor serves every stream profile. Entity streams page through a
//! collection; query-backed streams page through the `List` of a named query
//! that lives only for the duration of the run.

use super::types::{ResolvedRequest, StreamDefinition};
use crate::config::TapConfig;
use crate::decode::JsonDecoder;
use crate::error::Result;
use crate::http::HttpClient;
use crate::pagination::{PageCursor, PageToken};
use crate::query::EphemeralQueryManager;
use crate::state::{is_after, ReplicationState};
use crate::types::{ExtractionContext, Record, UrlParams};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Receives the records of a stream run, in order
#[async_trait]
pub trait RecordVisitor: Send {
    /// Handle one record; an error aborts the run
    async fn visit(&mut self, record: Record) -> Result<()>;
}

#[async_trait]
impl RecordVisitor for Vec<Record> {
    async fn visit(&mut self, record: Record) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Totals of one stream run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Records handed to the visitor
    pub records: usize,
    /// Requests issued
    pub pages: usize,
    /// Highest replication key value seen
    pub max_replication_value: Option<String>,
}

impl ExtractionSummary {
    fn observe(&mut self, record: &Record, replication_key: Option<&str>) {
        self.records += 1;
        let Some(value) = replication_key.and_then(|key| record.get(key)).and_then(bookmark_value)
        else {
            return;
        };
        if self.max_replication_value.as_deref().map_or(true, |max| is_after(&value, max)) {
            self.max_replication_value = Some(value);
        }
    }
}

/// Bookmarkable representation of a replication key value
fn bookmark_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lazily pages through the records of one resolved request
pub struct RecordPager<'a> {
    client: &'a HttpClient,
    cursor: &'a PageCursor,
    decoder: JsonDecoder,
    definition: &'a StreamDefinition,
    context: &'a ExtractionContext,
    path: String,
    params: UrlParams,
    token: Option<PageToken>,
    pages: usize,
    done: bool,
}

impl<'a> RecordPager<'a> {
    /// Fetch the next page of records, or `None` once the stream is exhausted.
    ///
    /// A page may legitimately be empty while more pages follow.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Record>>> {
        if self.done {
            return Ok(None);
        }

        let params = std::mem::take(&mut self.params);
        let body = self.client.get_json(&self.path, params).await?;
        self.pages += 1;

        let records: Vec<Record> = self
            .decoder
            .decode(&body)?
            .into_iter()
            .filter_map(|record| self.definition.apply_transform(record, self.context))
            .collect();

        let (next, params) = self.cursor.next_params(self.token.as_deref(), &body)?;
        match next {
            Some(token) => {
                debug!(
                    "Stream '{}' page {}: {} records, next page {token}",
                    self.definition.name,
                    self.pages,
                    records.len()
                );
                self.token = Some(token);
                self.params = params;
            }
            None => {
                debug!(
                    "Stream '{}' page {}: {} records, last page",
                    self.definition.name,
                    self.pages,
                    records.len()
                );
                self.done = true;
            }
        }

        Ok(Some(records))
    }

    /// Requests issued so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Check if the last page has been fetched
    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Extracts records for any stream profile
#[derive(Debug, Clone)]
pub struct StreamExtractor {
    client: Arc<HttpClient>,
    queries: EphemeralQueryManager,
    replication: ReplicationState,
    config: Arc<TapConfig>,
    cursor: PageCursor,
}

impl StreamExtractor {
    /// Create an extractor over an authenticated client
    pub fn new(client: Arc<HttpClient>, replication: ReplicationState, config: Arc<TapConfig>) -> Self {
        Self {
            queries: EphemeralQueryManager::new(client.clone()),
            client,
            replication,
            config,
            cursor: PageCursor::new(),
        }
    }

    /// The authenticated client
    pub fn client(&self) -> &Arc<HttpClient> {
        &self.client
    }

    /// Bookmarks used for first-page filters
    pub fn replication(&self) -> &ReplicationState {
        &self.replication
    }

    /// The run configuration
    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    /// Resolve the first request of `definition`, including its replication filter
    pub async fn resolve(
        &self,
        definition: &StreamDefinition,
        context: &ExtractionContext,
    ) -> Result<ResolvedRequest> {
        let mut request = definition.resolve(context, &self.config)?;
        if let Some(filter) = self
            .replication
            .first_page_filter(&definition.name, definition.replication_key.as_deref())
            .await
        {
            request.add_filter(&filter);
        }
        Ok(request)
    }

    /// Start paging from a resolved request
    pub fn pager<'a>(
        &'a self,
        definition: &'a StreamDefinition,
        context: &'a ExtractionContext,
        request: ResolvedRequest,
    ) -> RecordPager<'a> {
        RecordPager {
            client: &self.client,
            cursor: &self.cursor,
            decoder: JsonDecoder::with_path(definition.records_path.clone()),
            definition,
            context,
            path: request.path,
            params: request.params,
            token: None,
            pages: 0,
            done: false,
        }
    }

    /// Run `definition` once, handing each record to `visitor`.
    ///
    /// Query-backed streams create their query first and delete it afterwards,
    /// whatever the outcome.
    pub async fn extract(
        &self,
        definition: &StreamDefinition,
        context: &ExtractionContext,
        visitor: &mut dyn RecordVisitor,
    ) -> Result<ExtractionSummary> {
        let request = self.resolve(definition, context).await?;
        debug!("Extracting stream '{}' from {request}", definition.name);

        match request.query.clone() {
            None => self.drain(definition, context, request, visitor).await,
            Some(query) => {
                self.queries
                    .invoke_and_paginate(&query, move || {
                        self.drain(definition, context, request, visitor)
                    })
                    .await
            }
        }
    }

    /// Run `definition` once and collect its records
    pub async fn collect(
        &self,
        definition: &StreamDefinition,
        context: &ExtractionContext,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        self.extract(definition, context, &mut records).await?;
        Ok(records)
    }

    async fn drain(
        &self,
        definition: &StreamDefinition,
        context: &ExtractionContext,
        request: ResolvedRequest,
        visitor: &mut dyn RecordVisitor,
    ) -> Result<ExtractionSummary> {
        let replication_key = definition.replication_key.as_deref();
        let mut summary = ExtractionSummary::default();
        let mut pager = self.pager(definition, context, request);

        while let Some(records) = pager.next_page().await? {
            for record in records {
                summary.observe(&record, replication_key);
                visitor.visit(record).await?;
            }
        }

        summary.pages = pager.pages();
        Ok(summary)
    }
}
