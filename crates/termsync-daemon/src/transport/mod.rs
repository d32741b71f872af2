//! Terminal spawn/close transport and its change notices.

mod tmux;

use async_trait::async_trait;
use termsync_core::AgentId;
use tokio::sync::broadcast;

use crate::error::TransportError;

pub use tmux::TmuxTransport;
pub use tmux::WatchGuard;

/// One backing session as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListing {
    pub session_name: String,
    pub working_dir: Option<String>,
}

impl SessionListing {
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            working_dir: None,
        }
    }
}

/// A change made outside this process (another window, the user, a crash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportNotice {
    Spawned(SessionListing),
    Closed { session_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub session_name: String,
    pub terminal_type: String,
    pub working_dir: Option<String>,
}

#[async_trait]
pub trait TerminalTransport: Send + Sync {
    /// Starts a backing session and returns its handle.
    async fn spawn(&self, request: SpawnRequest) -> Result<AgentId, TransportError>;

    /// Binds to an existing session.
    async fn attach(&self, session_name: &str) -> Result<AgentId, TransportError>;

    async fn close(&self, session_name: &str) -> Result<(), TransportError>;

    /// Sessions carrying the configured prefix.
    async fn list_sessions(&self) -> Result<Vec<SessionListing>, TransportError>;

    fn subscribe(&self) -> broadcast::Receiver<TransportNotice>;
}

/// Notices that turn `previous` into `current`.
pub fn diff_sessions(
    previous: &[SessionListing],
    current: &[SessionListing],
) -> Vec<TransportNotice> {
    let known = |list: &[SessionListing], name: &str| list.iter().any(|s| s.session_name == name);

    let closed = previous
        .iter()
        .filter(|s| !known(current, &s.session_name))
        .map(|s| TransportNotice::Closed {
            session_name: s.session_name.clone(),
        });
    let spawned = current
        .iter()
        .filter(|s| !known(previous, &s.session_name))
        .cloned()
        .map(TransportNotice::Spawned);

    closed.chain(spawned).collect()
}
