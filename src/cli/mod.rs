//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Commands
//!
//! - `check` - Log in with the configured credentials
//! - `streams` - List the stream catalog
//! - `read` - Extract records from the selected streams

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
