//! In-memory transport that records calls and can be told to fail.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use termsync_core::AgentId;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::transport::{SessionListing, SpawnRequest, TerminalTransport, TransportNotice};

#[derive(Default)]
struct MockState {
    sessions: Vec<String>,
    spawned: Vec<SpawnRequest>,
    closed: Vec<String>,
    fail_spawn: Option<String>,
    fail_close: Option<String>,
    spawn_delay: Option<Duration>,
    attach_delay: Option<Duration>,
}

pub struct MockTransport {
    state: Mutex<MockState>,
    notices: broadcast::Sender<TransportNotice>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(MockState::default()),
            notices,
        }
    }

    pub fn add_session(&self, name: &str) {
        self.state.lock().unwrap().sessions.push(name.to_string());
    }

    pub fn remove_session(&self, name: &str) {
        self.state.lock().unwrap().sessions.retain(|s| s != name);
    }

    pub fn has_session(&self, name: &str) -> bool {
        self.state.lock().unwrap().sessions.iter().any(|s| s == name)
    }

    pub fn fail_spawn(&self, reason: &str) {
        self.state.lock().unwrap().fail_spawn = Some(reason.to_string());
    }

    pub fn fail_close(&self, reason: &str) {
        self.state.lock().unwrap().fail_close = Some(reason.to_string());
    }

    pub fn set_spawn_delay(&self, delay: Duration) {
        self.state.lock().unwrap().spawn_delay = Some(delay);
    }

    pub fn set_attach_delay(&self, delay: Duration) {
        self.state.lock().unwrap().attach_delay = Some(delay);
    }

    pub fn spawned(&self) -> Vec<SpawnRequest> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn notify(&self, notice: TransportNotice) {
        let _ = self.notices.send(notice);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminalTransport for MockTransport {
    async fn spawn(&self, request: SpawnRequest) -> Result<AgentId, TransportError> {
        let delay = self.state.lock().unwrap().spawn_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.spawned.push(request.clone());
        if let Some(reason) = &state.fail_spawn {
            return Err(TransportError::Spawn {
                session: request.session_name,
                reason: reason.clone(),
            });
        }
        state.sessions.push(request.session_name.clone());
        Ok(AgentId::new(request.session_name))
    }

    async fn attach(&self, session_name: &str) -> Result<AgentId, TransportError> {
        let delay = self.state.lock().unwrap().attach_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.has_session(session_name) {
            Ok(AgentId::new(session_name))
        } else {
            Err(TransportError::SessionNotFound(session_name.to_string()))
        }
    }

    async fn close(&self, session_name: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.fail_close {
            return Err(TransportError::Command {
                operation: "close".to_string(),
                reason: reason.clone(),
            });
        }
        state.closed.push(session_name.to_string());
        let before = state.sessions.len();
        state.sessions.retain(|s| s != session_name);
        if state.sessions.len() == before {
            return Err(TransportError::SessionNotFound(session_name.to_string()));
        }
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionListing>, TransportError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .map(SessionListing::new)
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportNotice> {
        self.notices.subscribe()
    }
}
