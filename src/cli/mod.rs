//! CLI support for remespath
//!
//! The commands behind the `remes` binary, exposed as plain functions so
//! other tools can run them without spawning a process.

mod check;
mod convert;
mod lint;

pub use check::{CheckOptions, CheckResult, execute_check, read_input};
pub use convert::{json_to_node, node_to_json};
pub use lint::{FormatOptions, LintReport, execute_format, execute_lint};

use std::io;

use crate::{JsonParseError, QueryError};

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Malformed JSON input
    Json(JsonParseError),
    /// Input rejected by the strict (serde_json) reader
    StrictJson(serde_json::Error),
    /// Query failed to compile or run
    Query(QueryError),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::StrictJson(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Query(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(f, "No input provided. Use --input, a file path, or pipe JSON to stdin."),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Json(e) => Some(e),
            CliError::StrictJson(e) => Some(e),
            CliError::Query(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::NoInput => None,
        }
    }
}

impl From<JsonParseError> for CliError {
    fn from(e: JsonParseError) -> Self {
        CliError::Json(e)
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        CliError::Query(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::StrictJson(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
