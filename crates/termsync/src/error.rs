//! CLI errors with structured context.
//!
//! Codes and categories are shared with the daemon crate so the exit status
//! follows sysexits.h regardless of which layer failed.

use std::io;

use serde_json::{Value, json};
use termsync_common::error_codes::{self, ErrorCategory};
use termsync_daemon::{BusError, DaemonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Hub did not relay the message within {timeout_ms}ms")]
    NotRelayed { timeout_ms: u64 },
}

impl CliError {
    pub fn code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => error_codes::INVALID_INPUT,
            CliError::Io(_) => error_codes::GENERIC_ERROR,
            CliError::Daemon(e) => e.code(),
            CliError::Bus(e) => e.code(),
            CliError::NotRelayed { .. } => error_codes::BUS_UNAVAILABLE,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CliError::Daemon(e) => e.category(),
            CliError::Io(_) => ErrorCategory::Internal,
            _ => error_codes::category_for_code(self.code()),
        }
    }

    pub fn context(&self) -> Value {
        match self {
            CliError::InvalidArgument(reason) => json!({ "reason": reason }),
            CliError::Io(e) => json!({ "reason": e.to_string() }),
            CliError::Daemon(e) => e.context(),
            CliError::Bus(e) => e.context(),
            CliError::NotRelayed { timeout_ms } => json!({ "timeout_ms": timeout_ms }),
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            CliError::InvalidArgument(_) => "Run 'termsync --help' for usage.".to_string(),
            CliError::Io(_) => "Check file permissions and try again.".to_string(),
            CliError::Daemon(e) => e.suggestion(),
            CliError::Bus(e) => e.suggestion(),
            CliError::NotRelayed { .. } => {
                "Check that 'termsync hub' is running and responsive.".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CliError::InvalidArgument(_) => false,
            CliError::Io(_) => false,
            CliError::Daemon(e) => e.is_retryable(),
            CliError::Bus(e) => e.is_retryable(),
            CliError::NotRelayed { .. } => true,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }
}
