//! Semantic error codes shared by every termsync crate.
//!
//! Codes follow the JSON-RPC 2.0 server-error range (-32000 to -32099) so
//! that errors can be reported verbatim over the hub socket or as JSON on
//! the CLI.

// Terminal registry errors
pub const TERMINAL_NOT_FOUND: i32 = -32001;
pub const NOT_OWNER: i32 = -32002;
pub const INVALID_TRANSITION: i32 = -32003;

// Input errors
pub const INVALID_INPUT: i32 = -32005;

// Transport errors
pub const SPAWN_FAILED: i32 = -32004;
pub const TRANSPORT_ERROR: i32 = -32008;

// External source errors
pub const QUERY_TIMEOUT: i32 = -32013;
pub const QUERY_FAILED: i32 = -32014;

// Broadcast / hub errors
pub const BUS_UNAVAILABLE: i32 = -32015;
pub const DAEMON_ERROR: i32 = -32016;
pub const ENCODE_ERROR: i32 = -32017;

pub const GENERIC_ERROR: i32 = -32000;

/// Error category for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Terminal not present in the registry
    NotFound,
    /// Invalid input or lifecycle transition
    InvalidInput,
    /// Terminal is owned by another window
    Busy,
    /// Internal error
    Internal,
    /// External dependency failure (tmux, hub, status sidecar)
    External,
    /// Operation timed out
    Timeout,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Busy => "busy",
            ErrorCategory::Internal => "internal",
            ErrorCategory::External => "external",
            ErrorCategory::Timeout => "timeout",
        }
    }

    /// sysexits.h-style exit code for the category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::InvalidInput => 64, // EX_USAGE
            ErrorCategory::NotFound => 69,     // EX_UNAVAILABLE
            ErrorCategory::Busy => 73,         // EX_CANTCREAT
            ErrorCategory::External => 74,     // EX_IOERR
            ErrorCategory::Internal => 74,     // EX_IOERR
            ErrorCategory::Timeout => 75,      // EX_TEMPFAIL
        }
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_found" => Ok(ErrorCategory::NotFound),
            "invalid_input" => Ok(ErrorCategory::InvalidInput),
            "busy" => Ok(ErrorCategory::Busy),
            "internal" => Ok(ErrorCategory::Internal),
            "external" => Ok(ErrorCategory::External),
            "timeout" => Ok(ErrorCategory::Timeout),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns whether an error code represents a transient condition.
pub fn is_retryable(code: i32) -> bool {
    matches!(code, QUERY_TIMEOUT | BUS_UNAVAILABLE | GENERIC_ERROR)
}

/// Returns the error category for a given error code.
pub fn category_for_code(code: i32) -> ErrorCategory {
    match code {
        TERMINAL_NOT_FOUND => ErrorCategory::NotFound,
        INVALID_TRANSITION | INVALID_INPUT => ErrorCategory::InvalidInput,
        NOT_OWNER => ErrorCategory::Busy,
        SPAWN_FAILED | TRANSPORT_ERROR | QUERY_FAILED | BUS_UNAVAILABLE | DAEMON_ERROR => {
            ErrorCategory::External
        }
        QUERY_TIMEOUT => ErrorCategory::Timeout,
        _ => ErrorCategory::Internal,
    }
}
