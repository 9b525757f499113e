//! Pagination module
//!
//! Service Layer pages with an OData next-link in the response body. The
//! `PageCursor` turns that link into the query parameters of the next request.
//!
//! # Overview
//!
//! The first page of a stream is built from its own parameters. Every later
//! page uses only the parameters found in the previous response's next-link;
//! the link already encodes filters, ordering and `$skip`, so nothing from the
//! first page is carried over.

mod cursor;

pub use cursor::{decode_next_link, NextPage, PageCursor, PageToken, NEXT_LINK_FIELDS};

#[cfg(test)]
mod tests;
