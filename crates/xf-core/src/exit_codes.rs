//! Exit codes for the xfetch CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-4: Operational outcomes (0 success, 2-4 guard/auth rejections)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal/unclassified errors

use xf_common::{Error, ErrorCategory};

/// Exit codes for xfetch operations.
///
/// Codes 2, 3, and 4 are a stable contract for automation: rate cadence
/// violated, monthly quota exceeded, and credential/query failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success: command completed
    Clean = 0,

    /// Blocked by the 15-minute rate cadence guard
    TimeGuard = 2,

    /// Blocked by the monthly post quota guard
    QuotaGuard = 3,

    /// Credential or query-key resolution failure
    AuthOrQuery = 4,

    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O or network error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code is a guard rejection (rate or quota).
    pub fn is_guard(self) -> bool {
        matches!(self, ExitCode::TimeGuard | ExitCode::QuotaGuard)
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::TimeGuard => "ERR_TIME_GUARD",
            ExitCode::QuotaGuard => "ERR_QUOTA_GUARD",
            ExitCode::AuthOrQuery => "ERR_AUTH_OR_QUERY",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::TimeGuard { .. } => ExitCode::TimeGuard,
            Error::QuotaGuard { .. } => ExitCode::QuotaGuard,
            Error::Json(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Credential | ErrorCategory::Query => ExitCode::AuthOrQuery,
                ErrorCategory::Config => ExitCode::ArgsError,
                ErrorCategory::Ledger | ErrorCategory::Io | ErrorCategory::Network => {
                    ExitCode::IoError
                }
                ErrorCategory::Guard => unreachable!("guard errors matched above"),
            },
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_errors_map_to_contract_codes() {
        let time = Error::TimeGuard {
            elapsed_secs: 300,
            required_secs: 900,
        };
        let quota = Error::QuotaGuard {
            used: 95,
            requested: 10,
            cap: 100,
        };
        assert_eq!(ExitCode::from(&time), ExitCode::TimeGuard);
        assert_eq!(ExitCode::from(&time).as_i32(), 2);
        assert_eq!(ExitCode::from(&quota), ExitCode::QuotaGuard);
        assert_eq!(ExitCode::from(&quota).as_i32(), 3);
    }

    #[test]
    fn auth_and_query_errors_map_to_exit_4() {
        assert_eq!(ExitCode::from(&Error::MissingToken).as_i32(), 4);
        assert_eq!(
            ExitCode::from(&Error::QueryKeyNotFound { key: "x".into() }).as_i32(),
            4
        );
        assert_eq!(
            ExitCode::from(&Error::AuthRejected { status: 401 }).as_i32(),
            4
        );
    }

    #[test]
    fn guard_predicate() {
        assert!(ExitCode::TimeGuard.is_guard());
        assert!(ExitCode::QuotaGuard.is_guard());
        assert!(!ExitCode::Clean.is_guard());
        assert!(ExitCode::Clean.is_success());
    }
}
