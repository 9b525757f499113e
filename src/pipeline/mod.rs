//! Extraction pipeline
//!
//! Runs the root streams of a catalog one after another. Each record of a
//! parent stream is emitted, then its child streams run with the context
//! derived from that record, depth-first.
//!
//! The first failure aborts the run. Bookmarks of streams that completed
//! before it stay committed, so the next run resumes from there.

mod sink;
mod types;

pub use sink::{JsonLinesSink, RecordSink, VecSink};
pub use types::{Message, SyncStats};

use crate::catalog::Catalog;
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::state::{is_after, ReplicationState, StateManager};
use crate::stream::{RecordVisitor, StreamDefinition, StreamExtractor};
use crate::types::{ExtractionContext, Record};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs catalog streams against the Service Layer
#[derive(Debug)]
pub struct ExtractionPipeline {
    catalog: Catalog,
    extractor: StreamExtractor,
    state: StateManager,
    selected: Option<BTreeSet<String>>,
}

impl ExtractionPipeline {
    /// Create a pipeline running every stream of `catalog`
    pub fn new(catalog: Catalog, extractor: StreamExtractor) -> Self {
        let state = extractor.replication().manager().clone();
        Self {
            catalog,
            extractor,
            state,
            selected: None,
        }
    }

    /// Create a pipeline over the built-in catalog for a validated config
    pub fn from_config(config: TapConfig, state: StateManager) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(HttpClient::for_tap(&config)?);
        let replication = ReplicationState::new(state, config.start_date.clone());
        let extractor = StreamExtractor::new(client, replication, Arc::new(config));
        Ok(Self::new(Catalog::builtin(), extractor))
    }

    /// Restrict the run to the named streams.
    ///
    /// Parents of a selected child still run to provide its context, but their
    /// records are not emitted and their bookmarks are not moved.
    pub fn with_selected_streams<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        for name in &names {
            self.catalog.require(name)?;
        }
        self.selected = Some(names);
        Ok(self)
    }

    /// The catalog being run
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The extractor running each stream
    pub fn extractor(&self) -> &StreamExtractor {
        &self.extractor
    }

    /// The state the pipeline commits bookmarks to
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Check if a stream was named in the selection
    fn is_explicitly_selected(&self, name: &str) -> bool {
        self.selected.as_ref().is_some_and(|s| s.contains(name))
    }

    /// Check if a stream's records are emitted
    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.as_ref().map_or(true, |s| s.contains(name))
    }

    /// Check if a stream has to run, for itself or for a selected descendant
    fn should_run(&self, definition: &StreamDefinition) -> bool {
        self.is_selected(&definition.name)
            || definition.children.iter().any(|link| {
                self.catalog
                    .get(&link.stream)
                    .is_some_and(|child| self.should_run(child))
            })
    }

    /// Run all selected root streams, emitting to `sink`
    pub async fn run(&self, sink: &mut dyn RecordSink) -> Result<SyncStats> {
        let started = Instant::now();
        let mut stats = SyncStats::new();

        for root in self.catalog.roots() {
            if !self.should_run(root) {
                debug!("Skipping unselected stream '{}'", root.name);
                continue;
            }
            if !self.is_explicitly_selected(&root.name)
                && root.lacks_query_options(self.extractor.config())
            {
                info!(
                    "Skipping stream '{}': no options under queries.{}",
                    root.name, root.name
                );
                continue;
            }
            let result = self
                .run_stream(root, &ExtractionContext::new(), &mut *sink, &mut stats)
                .await;
            if let Err(e) = result {
                stats.set_duration(started.elapsed().as_millis() as u64);
                warn!("Run aborted after {} records: {e}", stats.records_synced);
                sink.flush().await?;
                return Err(e);
            }
        }

        sink.flush().await?;
        stats.set_duration(started.elapsed().as_millis() as u64);
        info!(
            "Run finished: {} records, {} pages, {} stream runs in {}ms",
            stats.records_synced, stats.pages_fetched, stats.streams_synced, stats.duration_ms
        );
        Ok(stats)
    }

    /// Run one stream under `context`, including its children
    fn run_stream<'a>(
        &'a self,
        definition: &'a StreamDefinition,
        context: &'a ExtractionContext,
        sink: &'a mut dyn RecordSink,
        stats: &'a mut SyncStats,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = definition.name.as_str();
            let emit = self.is_selected(name);
            let query_params = definition
                .resolve(context, self.extractor.config())
                .ok()
                .and_then(|request| request.describe_params());

            debug!("Starting stream '{name}' with context {:?}", context);
            let mut visitor = StreamVisitor {
                pipeline: self,
                definition,
                sink: &mut *sink,
                stats: &mut *stats,
                emit,
            };

            let summary = match self.extractor.extract(definition, context, &mut visitor).await {
                Ok(summary) => summary,
                Err(e) => {
                    // A child failure is already counted where it happened
                    if !matches!(e, Error::Stream { .. }) {
                        stats.add_error();
                    }
                    return Err(e.in_stream(name, query_params));
                }
            };

            stats.add_stream();
            stats.add_pages(summary.pages);
            if definition.is_query_backed() {
                stats.add_query();
            }

            if emit {
                if let (Some(key), Some(value)) = (
                    definition.replication_key.as_deref(),
                    summary.max_replication_value,
                ) {
                    self.commit_bookmark(name, key, value, sink)
                        .await
                        .map_err(|e| e.in_stream(name, None))?;
                }
            }

            if context.is_empty() {
                info!(
                    "Finished stream '{name}': {} records in {} pages",
                    summary.records, summary.pages
                );
            } else {
                debug!(
                    "Finished stream '{name}' for {:?}: {} records",
                    context, summary.records
                );
            }
            Ok(())
        })
    }

    /// Move a stream's bookmark forward and emit the new state
    async fn commit_bookmark(
        &self,
        stream: &str,
        key: &str,
        value: String,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        if let Some(existing) = self.state.get_bookmark(stream).await {
            if !is_after(&value, &existing) {
                debug!("Bookmark of '{stream}' stays at {existing}");
                return Ok(());
            }
        }

        info!("Committing bookmark {stream}.{key} = {value}");
        self.state.commit_bookmark(stream, key, value).await?;
        let snapshot = self.state.snapshot().await;
        sink.emit(Message::state(&snapshot)).await
    }
}

/// Emits the records of one stream run and runs their children
struct StreamVisitor<'a> {
    pipeline: &'a ExtractionPipeline,
    definition: &'a StreamDefinition,
    sink: &'a mut dyn RecordSink,
    stats: &'a mut SyncStats,
    emit: bool,
}

#[async_trait]
impl RecordVisitor for StreamVisitor<'_> {
    async fn visit(&mut self, record: Record) -> Result<()> {
        let pipeline = self.pipeline;

        let child_contexts: Vec<_> = self
            .definition
            .children
            .iter()
            .filter_map(|link| {
                let child = pipeline.catalog.get(&link.stream)?;
                if !pipeline.should_run(child) {
                    return None;
                }
                let context = link.derive_context(&record);
                if context.is_none() {
                    debug!(
                        "Record of '{}' has no '{}', skipping '{}'",
                        self.definition.name, link.field, child.name
                    );
                }
                Some((child, context?))
            })
            .collect();

        if self.emit {
            self.sink
                .emit(Message::record(&self.definition.name, record))
                .await?;
            self.stats.add_records(1);
        }

        for (child, context) in child_contexts {
            pipeline
                .run_stream(child, &context, &mut *self.sink, &mut *self.stats)
                .await?;
        }
        Ok(())
    }
}
