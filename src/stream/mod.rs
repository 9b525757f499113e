//! Stream extraction module
//!
//! # Overview
//!
//! - `StreamDefinition` - Named profile of one logical source (entity or query)
//! - `ResolvedRequest` - First request of a run, rendered from the profile
//! - `RecordPager` - Lazy page-by-page record sequence
//! - `StreamExtractor` - Runs a profile, wrapping query-backed streams in the
//!   named query lifecycle
//! - `ChildLink` - Derives the context a child stream runs with

mod extractor;
mod types;

pub use extractor::{ExtractionSummary, RecordPager, RecordVisitor, StreamExtractor};
pub use types::{
    ChildLink, QueryParams, QueryProfile, RecordTransform, ResolvedRequest, StreamDefinition,
    StreamSource,
};
