//! Stream profiles and resolved requests

use crate::config::{QueryStreamOptions, TapConfig};
use crate::decode::DEFAULT_RECORDS_PATH;
use crate::error::{Error, Result};
use crate::query::QueryDefinition;
use crate::template::{self, TemplateContext};
use crate::types::{format_date, parse_date, ExtractionContext, Record, UrlParams};
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Per-record transform; returning `None` drops the record
pub type RecordTransform =
    Arc<dyn Fn(Record, &ExtractionContext) -> Option<Record> + Send + Sync>;

// ============================================================================
// Parent/child links
// ============================================================================

/// Declares a child stream run once per parent record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLink {
    /// Field of the parent record carrying the correlation value
    pub field: String,
    /// Key under which the value is handed to the child
    pub context_key: String,
    /// Name of the child stream
    pub stream: String,
}

impl ChildLink {
    /// Link `field` of each parent record to `stream` as `context_key`
    pub fn new(
        field: impl Into<String>,
        context_key: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            context_key: context_key.into(),
            stream: stream.into(),
        }
    }

    /// Context for the child run of `record`.
    ///
    /// Records without the correlation field (or with a null value) produce no
    /// child run.
    pub fn derive_context(&self, record: &Record) -> Option<ExtractionContext> {
        match record.get(&self.field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(ExtractionContext::new().with(&self.context_key, value.clone())),
        }
    }
}

// ============================================================================
// Sources
// ============================================================================

/// A stream backed by a named SQL query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProfile {
    /// Query created for the duration of the run
    pub definition: QueryDefinition,
    /// Whether the query takes a `:groupCode` parameter
    pub requires_group_code: bool,
}

/// Where a stream reads its records from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    /// An entity collection such as `/PurchaseInvoices`
    Entity {
        /// Path template, relative to the API base URL
        path: String,
        /// First-page parameters; values may be templates
        params: UrlParams,
    },
    /// A named SQL query listed through `SQLQueries('<code>')/List`
    Query(QueryProfile),
}

// ============================================================================
// Stream definition
// ============================================================================

/// Configuration profile of one logical source
#[derive(Clone)]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Where records come from
    pub source: StreamSource,
    /// JSONPath locating the records in each response
    pub records_path: String,
    /// Fields identifying a record
    pub primary_keys: Vec<String>,
    /// Field driving incremental extraction
    pub replication_key: Option<String>,
    /// Parent stream, for streams that only run with a parent context
    pub parent: Option<String>,
    /// Child streams run for each record
    pub children: Vec<ChildLink>,
    /// Optional per-record transform
    pub transform: Option<RecordTransform>,
}

impl StreamDefinition {
    fn with_source(name: impl Into<String>, source: StreamSource) -> Self {
        Self {
            name: name.into(),
            source,
            records_path: DEFAULT_RECORDS_PATH.to_string(),
            primary_keys: Vec::new(),
            replication_key: None,
            parent: None,
            children: Vec::new(),
            transform: None,
        }
    }

    /// A stream reading an entity collection
    pub fn entity(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_source(
            name,
            StreamSource::Entity {
                path: path.into(),
                params: UrlParams::new(),
            },
        )
    }

    /// A stream backed by a named query
    pub fn query(name: impl Into<String>, definition: QueryDefinition, requires_group_code: bool) -> Self {
        Self::with_source(
            name,
            StreamSource::Query(QueryProfile {
                definition,
                requires_group_code,
            }),
        )
    }

    /// Add a first-page parameter (entity streams only)
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let StreamSource::Entity { params, .. } = &mut self.source {
            params.append(key, value);
        }
        self
    }

    /// Set the records path
    #[must_use]
    pub fn with_records_path(mut self, path: impl Into<String>) -> Self {
        self.records_path = path.into();
        self
    }

    /// Set the primary key fields
    #[must_use]
    pub fn with_primary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the replication key
    #[must_use]
    pub fn with_replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_key = Some(key.into());
        self
    }

    /// Mark this stream as a child of `parent`
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add a child link
    #[must_use]
    pub fn with_child(mut self, link: ChildLink) -> Self {
        self.children.push(link);
        self
    }

    /// Set the record transform
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Record, &ExtractionContext) -> Option<Record> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Check if this stream is backed by a named query
    pub fn is_query_backed(&self) -> bool {
        matches!(self.source, StreamSource::Query(_))
    }

    /// Check if this query-backed stream needs a `queries.<name>` entry that
    /// `config` does not have.
    ///
    /// A group code is always per stream; the date range can fall back to the
    /// global `start_date`.
    pub fn lacks_query_options(&self, config: &TapConfig) -> bool {
        match &self.source {
            StreamSource::Query(profile) => {
                config.query_options(&self.name).is_none()
                    && (profile.requires_group_code || config.start_date.is_none())
            }
            StreamSource::Entity { .. } => false,
        }
    }

    /// Check if this stream only runs under a parent
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Apply the transform, if any
    pub fn apply_transform(&self, record: Record, context: &ExtractionContext) -> Option<Record> {
        match &self.transform {
            Some(transform) => transform(record, context),
            None => Some(record),
        }
    }

    /// Resolve the first request of a run.
    ///
    /// Entity paths and parameters are rendered against the parent context and
    /// the non-secret config values. Query streams validate their options here,
    /// before any query is created.
    pub fn resolve(&self, context: &ExtractionContext, config: &TapConfig) -> Result<ResolvedRequest> {
        self.resolve_at(context, config, Utc::now().date_naive())
    }

    /// Same as [`resolve`](Self::resolve) with an explicit current date
    pub fn resolve_at(
        &self,
        context: &ExtractionContext,
        config: &TapConfig,
        today: NaiveDate,
    ) -> Result<ResolvedRequest> {
        match &self.source {
            StreamSource::Entity { path, params } => {
                let mut ctx = TemplateContext::with_config(config.template_values());
                ctx.set_context(context);

                let path = template::render(path, &ctx)?;
                let mut rendered = UrlParams::new();
                for (key, value) in params.to_pairs() {
                    rendered.append(key, template::render(&value, &ctx)?);
                }

                Ok(ResolvedRequest {
                    path,
                    params: rendered,
                    query: None,
                    query_params: None,
                })
            }
            StreamSource::Query(profile) => {
                let query_params = QueryParams::from_options(
                    &self.name,
                    config.query_options(&self.name),
                    config.start_date.as_deref(),
                    profile.requires_group_code,
                    today,
                )?;

                Ok(ResolvedRequest {
                    path: profile.definition.list_path(),
                    params: query_params.to_url_params(),
                    query: Some(profile.definition.clone()),
                    query_params: Some(query_params),
                })
            }
        }
    }
}

impl fmt::Debug for StreamDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDefinition")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("records_path", &self.records_path)
            .field("primary_keys", &self.primary_keys)
            .field("replication_key", &self.replication_key)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

// ============================================================================
// Query parameters
// ============================================================================

/// Validated parameters of a query-backed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    /// First document date, inclusive
    pub start_date: NaiveDate,
    /// Last document date
    pub end_date: NaiveDate,
    /// Item group filter
    pub group_code: Option<i64>,
}

impl QueryParams {
    /// Validate the raw options of `stream`.
    ///
    /// The start date falls back to the global `start_date` and the end date
    /// to `today`. Only the date portion of each value is kept.
    pub fn from_options(
        stream: &str,
        options: Option<&QueryStreamOptions>,
        global_start: Option<&str>,
        requires_group_code: bool,
        today: NaiveDate,
    ) -> Result<Self> {
        let raw_start = options
            .and_then(|o| o.start_date.as_deref())
            .or(global_start)
            .ok_or_else(|| Error::missing_field(format!("queries.{stream}.start_date")))?;
        let start_date = parse_date(raw_start).ok_or_else(|| {
            Error::invalid_value(
                format!("queries.{stream}.start_date"),
                format!("'{raw_start}' is not a date"),
            )
        })?;

        let end_date = match options.and_then(|o| o.end_date.as_deref()) {
            Some(raw_end) => parse_date(raw_end).ok_or_else(|| {
                Error::invalid_value(
                    format!("queries.{stream}.end_date"),
                    format!("'{raw_end}' is not a date"),
                )
            })?,
            None => today,
        };

        if end_date < start_date {
            return Err(Error::invalid_value(
                format!("queries.{stream}.end_date"),
                format!("{end_date} is before start date {start_date}"),
            ));
        }

        let group_code = match options.and_then(|o| o.group_code.as_deref()) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                Error::invalid_value(
                    format!("queries.{stream}.group_code"),
                    format!("'{raw}' is not an integer"),
                )
            })?),
            None if requires_group_code => {
                return Err(Error::missing_field(format!("queries.{stream}.group_code")))
            }
            None => None,
        };

        Ok(Self {
            start_date,
            end_date,
            group_code: group_code.filter(|_| requires_group_code),
        })
    }

    /// Parameters of the `List` request
    pub fn to_url_params(&self) -> UrlParams {
        let mut params = UrlParams::new()
            .with("startDate", format!("'{}'", format_date(self.start_date)))
            .with("endDate", format!("'{}'", format_date(self.end_date)));
        if let Some(code) = self.group_code {
            params.append("groupCode", code.to_string());
        }
        params
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.group_code {
            write!(f, "group_code={code}, ")?;
        }
        write!(
            f,
            "start_date={}, end_date={}",
            format_date(self.start_date),
            format_date(self.end_date)
        )
    }
}

// ============================================================================
// Resolved request
// ============================================================================

/// First request of a stream run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// Path relative to the API base URL
    pub path: String,
    /// First-page parameters
    pub params: UrlParams,
    /// Query to create before paging, for query-backed streams
    pub query: Option<QueryDefinition>,
    /// Validated query parameters, for query-backed streams
    pub query_params: Option<QueryParams>,
}

impl ResolvedRequest {
    /// Add a replication filter, joining an existing `$filter` with `and`
    pub fn add_filter(&mut self, filter: &str) {
        let combined = match self.params.get("$filter") {
            Some(existing) => format!("{existing} and {filter}"),
            None => filter.to_string(),
        };
        self.params.set("$filter", combined);
    }

    /// Description of the query parameters, used in error messages
    pub fn describe_params(&self) -> Option<String> {
        self.query_params.as_ref().map(ToString::to_string)
    }
}

impl fmt::Display for ResolvedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}?{}", self.path, self.params)
        }
    }
}
