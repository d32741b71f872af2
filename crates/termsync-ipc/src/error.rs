use std::io;

use serde_json::{Value, json};
use thiserror::Error;

use crate::error_codes::{self, ErrorCategory};

/// Encoding, decoding and framing errors on the broadcast channel.
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Frame size limit exceeded (max {max_bytes} bytes)")]
    SizeLimit { max_bytes: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,
}

impl IpcError {
    pub fn code(&self) -> i32 {
        match self {
            IpcError::Encode(_) | IpcError::SizeLimit { .. } => error_codes::ENCODE_ERROR,
            IpcError::Decode(_) | IpcError::InvalidSnapshot(_) => error_codes::INVALID_INPUT,
            IpcError::Io(_) | IpcError::ConnectionClosed => error_codes::BUS_UNAVAILABLE,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn context(&self) -> Value {
        match self {
            IpcError::Encode(e) => json!({ "operation": "encode", "reason": e.to_string() }),
            IpcError::Decode(reason) => json!({ "operation": "decode", "reason": reason }),
            IpcError::InvalidSnapshot(reason) => {
                json!({ "operation": "snapshot", "reason": reason })
            }
            IpcError::SizeLimit { max_bytes } => json!({ "max_bytes": max_bytes }),
            IpcError::Io(e) => json!({ "operation": "io", "reason": e.to_string() }),
            IpcError::ConnectionClosed => json!({ "operation": "read" }),
        }
    }

    pub fn is_retryable(&self) -> bool {
        error_codes::is_retryable(self.code())
    }
}
