//! Errors for window, bus, transport and query operations.
//!
//! Each error maps to a shared error code and carries structured context so
//! the CLI can render it as text or JSON.

use serde_json::{Value, json};
use termsync_core::TransitionError;
use termsync_ipc::IpcError;
use termsync_ipc::error_codes::{self, ErrorCategory};
use thiserror::Error;

/// Errors from the tmux (or mock) terminal transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn session '{session}': {reason}")]
    Spawn { session: String, reason: String },
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Transport command failed during {operation}: {reason}")]
    Command { operation: String, reason: String },
}

impl TransportError {
    pub fn code(&self) -> i32 {
        match self {
            TransportError::Spawn { .. } => error_codes::SPAWN_FAILED,
            TransportError::SessionNotFound(_) => error_codes::TERMINAL_NOT_FOUND,
            TransportError::Command { .. } => error_codes::TRANSPORT_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn context(&self) -> Value {
        match self {
            TransportError::Spawn { session, reason } => {
                json!({ "operation": "spawn", "session": session, "reason": reason })
            }
            TransportError::SessionNotFound(session) => json!({ "session": session }),
            TransportError::Command { operation, reason } => {
                json!({ "operation": operation, "reason": reason })
            }
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            TransportError::Spawn { .. } => {
                "Check that tmux is installed and the working directory exists.".to_string()
            }
            TransportError::SessionNotFound(_) => {
                "The backing tmux session is gone. Run 'list' to refresh terminals.".to_string()
            }
            TransportError::Command { .. } => "Check that tmux is on PATH.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Command { .. })
    }
}

/// Errors returned to callers of the lifecycle use cases.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Terminal not found: {0}")]
    NotFound(String),
    #[error("Terminal {terminal_id} is owned by window {owner}")]
    NotOwner { terminal_id: String, owner: String },
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Window runtime has stopped")]
    WindowClosed,
}

impl LifecycleError {
    pub fn code(&self) -> i32 {
        match self {
            LifecycleError::NotFound(_) => error_codes::TERMINAL_NOT_FOUND,
            LifecycleError::NotOwner { .. } => error_codes::NOT_OWNER,
            LifecycleError::InvalidTransition(_) => error_codes::INVALID_TRANSITION,
            LifecycleError::InvalidInput(_) => error_codes::INVALID_INPUT,
            LifecycleError::Transport(e) => e.code(),
            LifecycleError::WindowClosed => error_codes::DAEMON_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn context(&self) -> Value {
        match self {
            LifecycleError::NotFound(id) => json!({ "terminal_id": id }),
            LifecycleError::NotOwner { terminal_id, owner } => {
                json!({ "terminal_id": terminal_id, "owner": owner })
            }
            LifecycleError::InvalidTransition(e) => json!({
                "terminal_id": e.terminal_id.as_str(),
                "from": e.from.as_str(),
                "to": e.to.as_str(),
            }),
            LifecycleError::InvalidInput(reason) => json!({ "reason": reason }),
            LifecycleError::Transport(e) => e.context(),
            LifecycleError::WindowClosed => json!({ "operation": "window" }),
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            LifecycleError::NotFound(_) => {
                "Run 'list' to see the terminals known to this window.".to_string()
            }
            LifecycleError::NotOwner { owner, .. } => format!(
                "Only window '{}' may do this while the terminal is live. Detach it first.",
                owner
            ),
            LifecycleError::InvalidTransition(e) => {
                format!("Terminal is {}; run 'list' to check its state.", e.from)
            }
            LifecycleError::InvalidInput(_) => "Check the command arguments.".to_string(),
            LifecycleError::Transport(e) => e.suggestion(),
            LifecycleError::WindowClosed => "Restart the window.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            LifecycleError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Errors from the broadcast channel.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Broadcast channel closed")]
    Closed,
    #[error("Broadcast queue full")]
    Full,
    #[error("Failed to connect to hub at {path}: {reason}")]
    Connect { path: String, reason: String },
    #[error(transparent)]
    Ipc(#[from] IpcError),
}

impl BusError {
    pub fn code(&self) -> i32 {
        match self {
            BusError::Ipc(e) => e.code(),
            _ => error_codes::BUS_UNAVAILABLE,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn context(&self) -> Value {
        match self {
            BusError::Closed => json!({ "operation": "publish", "reason": "closed" }),
            BusError::Full => json!({ "operation": "publish", "reason": "full" }),
            BusError::Connect { path, reason } => {
                json!({ "operation": "connect", "path": path, "reason": reason })
            }
            BusError::Ipc(e) => e.context(),
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            BusError::Connect { .. } | BusError::Closed => {
                "Start the relay with 'termsync hub' or check TERMSYNC_SOCKET.".to_string()
            }
            BusError::Full => "Peers are not keeping up; the next change resends full state."
                .to_string(),
            BusError::Ipc(_) => "Check that all windows run the same termsync version.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            BusError::Ipc(e) => e.is_retryable(),
            _ => true,
        }
    }
}

/// Errors from external status queries.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("Query request failed: {0}")]
    Request(String),
    #[error("Query returned HTTP {0}")]
    Status(u16),
    #[error("Query reported failure")]
    Unsuccessful,
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl QueryError {
    pub fn code(&self) -> i32 {
        match self {
            QueryError::Timeout { .. } => error_codes::QUERY_TIMEOUT,
            QueryError::InvalidUrl(_) => error_codes::INVALID_INPUT,
            _ => error_codes::QUERY_FAILED,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, QueryError::InvalidUrl(_))
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return QueryError::Status(status.as_u16());
        }
        QueryError::Request(e.to_string())
    }
}

/// Hub and window start-up errors.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to bind socket: {0}")]
    SocketBind(String),
    #[error("Another hub is already running")]
    AlreadyRunning,
    #[error("Failed to setup signal handler: {0}")]
    SignalSetup(String),
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl DaemonError {
    pub fn code(&self) -> i32 {
        match self {
            DaemonError::Bus(e) => e.code(),
            _ => error_codes::DAEMON_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DaemonError::AlreadyRunning => ErrorCategory::Busy,
            _ => error_codes::category_for_code(self.code()),
        }
    }

    pub fn context(&self) -> Value {
        match self {
            DaemonError::SocketBind(reason) => {
                json!({ "operation": "socket_bind", "reason": reason })
            }
            DaemonError::AlreadyRunning => {
                json!({ "operation": "startup", "reason": "another instance running" })
            }
            DaemonError::SignalSetup(reason) => {
                json!({ "operation": "signal_setup", "reason": reason })
            }
            DaemonError::Bus(e) => e.context(),
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            DaemonError::SocketBind(_) => {
                "Check if the socket directory is writable, or set TERMSYNC_SOCKET.".to_string()
            }
            DaemonError::AlreadyRunning => {
                "A hub is already relaying on this socket; windows can connect to it.".to_string()
            }
            DaemonError::SignalSetup(_) => {
                "Signal handler setup failed. Check system signal configuration.".to_string()
            }
            DaemonError::Bus(e) => e.suggestion(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DaemonError::Bus(e) => e.is_retryable(),
            _ => false,
        }
    }
}
