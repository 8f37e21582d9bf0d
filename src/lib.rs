//! `retoken` is a library for literal find-and-replace across project trees.
//!
//! It provides the core logic for the `retoken` command-line tool but can also be
//! used as a standalone library. The main components are:
//!
//! - `rewriter`: walks the configured roots, filters files by extension and
//!   ignored directory names, rewrites the search token in place and returns a
//!   report of changed files.
//! - `config`: the rewrite settings, their defaults, and YAML loading.
//! - `output_formatter`: renders a report as text, JSON or CSV.

pub mod cli;
pub mod config;
pub mod errors;
pub mod output_formatter;
pub mod rewriter;

// Re-export main types for easier access by library users.
pub use config::RewriteConfig;
pub use errors::{Error, Result};
pub use output_formatter::{OutputFormat, OutputFormatter};
pub use rewriter::{FileOutcome, RewriteReport, RunOptions, TreeRewriter};
