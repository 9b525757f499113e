//! Response decoding module
//!
//! Locates the list of record objects inside a Service Layer response body
//! with a JSONPath expression such as `$.value[*]`.

mod decoder;

pub use decoder::{JsonDecoder, DEFAULT_RECORDS_PATH};

#[cfg(test)]
mod tests;
