// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # SAP Business One Service Layer tap
//!
//! Incrementally extracts purchasing documents from the SAP Business One
//! Service Layer and writes them as JSON-lines messages.
//!
//! ## Features
//!
//! - **Session Login**: One cached `B1SESSION` cookie per run, closed with a logout
//! - **OData Paging**: Follows `odata.nextLink` / `@odata.nextLink` continuations
//! - **Incremental Sync**: Replication-key bookmarks filter the first page
//! - **Named SQL Queries**: Created for the run, paged through, always deleted
//! - **Parent/Child Streams**: Child streams run per parent record, depth-first
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sapb1_tap::{ExtractionPipeline, JsonLinesSink, StateManager, TapConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = TapConfig::from_file("config.json")?;
//!     let state = StateManager::from_file("state.json")?;
//!
//!     let pipeline = ExtractionPipeline::from_config(config, state)?;
//!     let stats = pipeline.run(&mut JsonLinesSink::stdout()).await?;
//!     println!("{} records", stats.records_synced);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     ExtractionPipeline                          │
//! │  catalog roots → StreamExtractor → children per record → sink   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │   Paginate    │   Query   │   State     │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Session  │ Retry     │ nextLink      │ Create    │ Bookmarks   │
//! │ Logout   │ Rate Limit│ Param replace │ List      │ Filters     │
//! │          │ Backoff   │               │ Delete    │ Save        │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and type aliases
pub mod types;

/// Service Layer session authentication
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// OData next-link pagination
pub mod pagination;

/// Response record extraction
pub mod decode;

/// Bookmarks and replication filters
pub mod state;

/// Named SQL query lifecycle
pub mod query;

/// Stream definitions and extraction
pub mod stream;

/// Built-in stream catalog
pub mod catalog;

/// Extraction pipeline and message output
pub mod pipeline;

/// Tap configuration
pub mod config;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::TapConfig;
pub use pipeline::{ExtractionPipeline, JsonLinesSink, Message, RecordSink, SyncStats};
pub use state::StateManager;
pub use stream::{StreamDefinition, StreamExtractor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
