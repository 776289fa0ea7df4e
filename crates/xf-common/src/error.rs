//! Error types for xfetch.
//!
//! Structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! Errors can be formatted for human consumption with headline, reason, and fix:
//! ```text
//! ✗ Monthly Quota Guard
//!   Reason: monthly quota would be exceeded: used=95, requested=10, cap=100
//!   Fix: Wait for the next calendar month or run 'xfetch reset --what monthly'.
//! ```
//!
//! # Machine-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 21,
//!   "category": "guard",
//!   "message": "monthly quota would be exceeded: used=95, requested=10, cap=100",
//!   "recoverable": true,
//!   "context": { "used": 95, "requested": 10, "cap": 100 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xfetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rate/quota guard rejections.
    Guard,
    /// Credential errors (missing or rejected bearer token).
    Credential,
    /// Query resolution errors (unknown key, over-length query, API rejection).
    Query,
    /// Configuration file errors (queries.yaml, limits.toml).
    Config,
    /// Usage ledger errors (lock contention, corrupted state).
    Ledger,
    /// Network transport errors.
    Network,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Guard => write!(f, "guard"),
            ErrorCategory::Credential => write!(f, "credential"),
            ErrorCategory::Query => write!(f, "query"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Ledger => write!(f, "ledger"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for xfetch.
#[derive(Error, Debug)]
pub enum Error {
    // Guard errors (20-29)
    #[error("rate cadence violated: {elapsed_secs}s since last call, need ≥{required_secs}s")]
    TimeGuard {
        elapsed_secs: i64,
        required_secs: u64,
    },

    #[error("monthly quota would be exceeded: used={used}, requested={requested}, cap={cap}")]
    QuotaGuard { used: u32, requested: u32, cap: u32 },

    // Credential errors (30-39)
    #[error("no bearer token configured (set XFETCH_BEARER_TOKEN)")]
    MissingToken,

    #[error("API rejected credentials: HTTP {status}")]
    AuthRejected { status: u16 },

    // Query errors (40-49)
    #[error("query-key '{key}' not found in queries.yaml")]
    QueryKeyNotFound { key: String },

    #[error("query too long ({len} chars); free plan allows ≤{max}")]
    QueryTooLong { len: usize, max: usize },

    #[error("API rejected query: HTTP {status}: {message}")]
    QueryRejected { status: u16, message: String },

    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    // Ledger errors (50-59)
    #[error("ledger file corrupted at {path}: {reason}")]
    LedgerCorrupted { path: PathBuf, reason: String },

    // Network errors (70-79)
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected API response: HTTP {status}")]
    UnexpectedStatus { status: u16 },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    ///
    /// Codes are grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Guard errors
    /// - 30-39: Credential errors
    /// - 40-49: Query errors
    /// - 50-59: Ledger errors
    /// - 60-69: I/O errors
    /// - 70-79: Network errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::ConfigNotFound { .. } => 11,
            Error::TimeGuard { .. } => 20,
            Error::QuotaGuard { .. } => 21,
            Error::MissingToken => 30,
            Error::AuthRejected { .. } => 31,
            Error::QueryKeyNotFound { .. } => 40,
            Error::QueryTooLong { .. } => 41,
            Error::QueryRejected { .. } => 42,
            Error::LedgerCorrupted { .. } => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Network(_) => 70,
            Error::UnexpectedStatus { .. } => 71,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::TimeGuard { .. } | Error::QuotaGuard { .. } => ErrorCategory::Guard,
            Error::MissingToken | Error::AuthRejected { .. } => ErrorCategory::Credential,
            Error::QueryKeyNotFound { .. }
            | Error::QueryTooLong { .. }
            | Error::QueryRejected { .. } => ErrorCategory::Query,
            Error::Config(_) | Error::ConfigNotFound { .. } => ErrorCategory::Config,
            Error::LedgerCorrupted { .. } => ErrorCategory::Ledger,
            Error::Network(_) | Error::UnexpectedStatus { .. } => ErrorCategory::Network,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by user action.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Guards clear themselves with time (or an explicit reset)
            Error::TimeGuard { .. } => true,
            Error::QuotaGuard { .. } => true,

            Error::MissingToken => true,
            Error::AuthRejected { .. } => true,

            Error::QueryKeyNotFound { .. } => true,
            Error::QueryTooLong { .. } => true,
            Error::QueryRejected { .. } => true,

            Error::Config(_) => true,
            Error::ConfigNotFound { .. } => true,

            Error::LedgerCorrupted { .. } => true, // Can reset

            Error::Network(_) => true,
            Error::UnexpectedStatus { .. } => false,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::TimeGuard { .. } => {
                "Wait for the 15-minute window to pass; 'xfetch status' shows the last call time."
            }
            Error::QuotaGuard { .. } => {
                "Wait for the next calendar month or run 'xfetch reset --what monthly'."
            }
            Error::MissingToken => {
                "Export XFETCH_BEARER_TOKEN with your API bearer token, or use --offline."
            }
            Error::AuthRejected { .. } => {
                "Check that the bearer token is valid and has access to the free-plan endpoints."
            }
            Error::QueryKeyNotFound { .. } => {
                "Add the key to queries.yaml in the config directory, or check for typos."
            }
            Error::QueryTooLong { .. } => {
                "Shorten the query in queries.yaml; the free plan allows at most 512 characters."
            }
            Error::QueryRejected { .. } => {
                "Check the query syntax in queries.yaml against the API's search operators."
            }
            Error::Config(_) | Error::ConfigNotFound { .. } => {
                "Check the config directory (--config or XFETCH_CONFIG_DIR) and file syntax."
            }
            Error::LedgerCorrupted { .. } => {
                "Run 'xfetch reset --what all' to recreate the ledger."
            }
            Error::Network(_) => "Check network connectivity and retry.",
            Error::UnexpectedStatus { .. } => {
                "The API returned an unexpected response. Retry later; report if persistent."
            }
            Error::Io(_) => "Check disk space and permissions on the data directory.",
            Error::Json(_) => "A payload failed to serialize. Report this as a bug.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::TimeGuard { .. } => "Rate Cadence Guard",
            Error::QuotaGuard { .. } => "Monthly Quota Guard",
            Error::MissingToken => "Missing Credentials",
            Error::AuthRejected { .. } => "Credentials Rejected",
            Error::QueryKeyNotFound { .. } => "Unknown Query Key",
            Error::QueryTooLong { .. } => "Query Too Long",
            Error::QueryRejected { .. } => "Query Rejected",
            Error::Config(_) => "Configuration Error",
            Error::ConfigNotFound { .. } => "Config File Not Found",
            Error::LedgerCorrupted { .. } => "Ledger Corrupted",
            Error::Network(_) => "Network Error",
            Error::UnexpectedStatus { .. } => "Unexpected API Response",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "Serialization Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., quota numbers).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::TimeGuard {
                elapsed_secs,
                required_secs,
            } => {
                context.insert("elapsed_secs".to_string(), serde_json::json!(elapsed_secs));
                context.insert(
                    "required_secs".to_string(),
                    serde_json::json!(required_secs),
                );
            }
            Error::QuotaGuard {
                used,
                requested,
                cap,
            } => {
                context.insert("used".to_string(), serde_json::json!(used));
                context.insert("requested".to_string(), serde_json::json!(requested));
                context.insert("cap".to_string(), serde_json::json!(cap));
            }
            Error::QueryKeyNotFound { key } => {
                context.insert("query_key".to_string(), serde_json::json!(key));
            }
            Error::AuthRejected { status }
            | Error::UnexpectedStatus { status }
            | Error::QueryRejected { status, .. } => {
                context.insert("status".to_string(), serde_json::json!(status));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
