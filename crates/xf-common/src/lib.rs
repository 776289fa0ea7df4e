//! Shared types for xfetch: query keys, output formats, and the error
//! taxonomy used across the workspace.

pub mod error;
pub mod output;
pub mod query;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use output::OutputFormat;
pub use query::QueryKey;

/// Schema version stamped into persisted state and JSON payloads.
pub const SCHEMA_VERSION: &str = "1.0.0";
