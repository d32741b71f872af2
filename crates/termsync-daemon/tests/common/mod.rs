#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use termsync_core::{AgentId, Snapshot};
use termsync_daemon::{
    BroadcastChannel, LocalBus, QueryError, Replicator, SessionListing,
    SessionMetadataSource, SpawnRequest, StatusSource, TerminalLifecycle, TerminalTransport,
    TransportError, TransportNotice, WindowConfig, WindowHandle, WindowRuntime,
};
use termsync_ipc::{BroadcastMessage, SessionInfoResponse, StatusResponse};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const PREFIX: &str = "ctt-";
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DISCOVERY_DELAY: Duration = Duration::from_millis(50);

/// One tmux server shared by every window in a test.
pub struct FakeTmux {
    sessions: Mutex<BTreeSet<String>>,
    notices: broadcast::Sender<TransportNotice>,
}

impl FakeTmux {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            sessions: Mutex::new(BTreeSet::new()),
            notices,
        }
    }

    /// A session created outside termsync, announced like the watcher would.
    pub fn spawn_external(&self, name: &str) {
        self.sessions.lock().unwrap().insert(name.to_string());
        let _ = self
            .notices
            .send(TransportNotice::Spawned(SessionListing::new(name)));
    }

    /// Seeds a session without a notice, as if it predates every window.
    pub fn seed(&self, name: &str) {
        self.sessions.lock().unwrap().insert(name.to_string());
    }

    /// The session dies on its own.
    pub fn kill_external(&self, name: &str) {
        self.sessions.lock().unwrap().remove(name);
        let _ = self.notices.send(TransportNotice::Closed {
            session_name: name.to_string(),
        });
    }

    pub fn has_session(&self, name: &str) -> bool {
        self.sessions.lock().unwrap().contains(name)
    }
}

#[async_trait]
impl TerminalTransport for FakeTmux {
    async fn spawn(&self, request: SpawnRequest) -> Result<AgentId, TransportError> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.insert(request.session_name.clone()) {
            return Err(TransportError::Spawn {
                session: request.session_name,
                reason: "duplicate session".to_string(),
            });
        }
        Ok(AgentId::new(request.session_name))
    }

    async fn attach(&self, session_name: &str) -> Result<AgentId, TransportError> {
        if self.has_session(session_name) {
            Ok(AgentId::new(session_name))
        } else {
            Err(TransportError::SessionNotFound(session_name.to_string()))
        }
    }

    async fn close(&self, session_name: &str) -> Result<(), TransportError> {
        if self.sessions.lock().unwrap().remove(session_name) {
            Ok(())
        } else {
            Err(TransportError::SessionNotFound(session_name.to_string()))
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionListing>, TransportError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .map(SessionListing::new)
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportNotice> {
        self.notices.subscribe()
    }
}

/// Sidecar answering from tables keyed by working directory and session.
#[derive(Default)]
pub struct FakeSidecar {
    statuses: Mutex<HashMap<String, String>>,
    titles: Mutex<HashMap<String, String>>,
    slow: Mutex<HashMap<String, Duration>>,
}

impl FakeSidecar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, dir: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(dir.to_string(), status.to_string());
    }

    pub fn set_title(&self, session: &str, title: &str) {
        self.titles
            .lock()
            .unwrap()
            .insert(session.to_string(), title.to_string());
    }

    pub fn delay(&self, key: &str, delay: Duration) {
        self.slow.lock().unwrap().insert(key.to_string(), delay);
    }

    pub fn clear_delay(&self, key: &str) {
        self.slow.lock().unwrap().remove(key);
    }

    async fn pause(&self, key: &str) {
        let delay = self.slow.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl StatusSource for FakeSidecar {
    async fn status(
        &self,
        working_dir: &str,
        _session_name: Option<&str>,
    ) -> Result<StatusResponse, QueryError> {
        self.pause(working_dir).await;
        let status = self.statuses.lock().unwrap().get(working_dir).cloned();
        status
            .map(|status| StatusResponse {
                success: true,
                status: Some(status),
                current_activity: None,
                last_updated: None,
            })
            .ok_or(QueryError::Unsuccessful)
    }
}

#[async_trait]
impl SessionMetadataSource for FakeSidecar {
    async fn session_info(&self, session_name: &str) -> Result<SessionInfoResponse, QueryError> {
        self.pause(session_name).await;
        let title = self.titles.lock().unwrap().get(session_name).cloned();
        title
            .map(|title| SessionInfoResponse {
                success: true,
                display_title: Some(title),
                peer_window_count: None,
            })
            .ok_or(QueryError::Unsuccessful)
    }
}

pub fn window_config(window_id: &str) -> WindowConfig {
    WindowConfig::default()
        .with_window_id(window_id.into())
        .with_session_prefix(PREFIX)
        .with_discovery_delay(DISCOVERY_DELAY)
}

/// A running window plus the handles tests drive it through.
pub struct TestWindow {
    pub handle: WindowHandle,
    pub lifecycle: TerminalLifecycle,
    pub replicator: Arc<Replicator>,
    task: JoinHandle<()>,
}

impl TestWindow {
    pub fn start(
        window_id: &str,
        bus: Option<Arc<dyn BroadcastChannel>>,
        tmux: Arc<FakeTmux>,
    ) -> Self {
        let (runtime, handle) = WindowRuntime::new(&window_config(window_id), bus, tmux.clone());
        let replicator = runtime.replicator();
        let task = runtime.spawn();
        let lifecycle = TerminalLifecycle::new(handle.clone(), tmux, PREFIX);
        Self {
            handle,
            lifecycle,
            replicator,
            task,
        }
    }

    pub async fn state(&self) -> Snapshot {
        self.handle.get().await.unwrap()
    }

    /// Polls until `pred` holds, panicking with the last state on timeout.
    pub async fn wait_for<F>(&self, what: &str, pred: F) -> Snapshot
    where
        F: Fn(&Snapshot) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let snapshot = self.state().await;
            if pred(&snapshot) {
                return snapshot;
            }
            if Instant::now() >= deadline {
                panic!(
                    "{}: timed out waiting for {}: {:?}",
                    self.handle.window_id(),
                    what,
                    snapshot
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Shuts the window down and waits for its task to finish.
    pub async fn stop(mut self) {
        self.handle.shutdown().await;
        let _ = (&mut self.task).await;
    }
}

impl Drop for TestWindow {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Windows sharing one in-process bus and one tmux server.
pub struct Cluster {
    pub bus: Arc<LocalBus>,
    pub tmux: Arc<FakeTmux>,
}

impl Cluster {
    pub fn new() -> Self {
        Self {
            bus: Arc::new(LocalBus::new(256)),
            tmux: Arc::new(FakeTmux::new()),
        }
    }

    pub fn window(&self, window_id: &str) -> TestWindow {
        let bus: Arc<dyn BroadcastChannel> = self.bus.clone();
        TestWindow::start(window_id, Some(bus), Arc::clone(&self.tmux))
    }

    /// Publishes a hand-built message as if another window sent it.
    pub fn inject(&self, message: &BroadcastMessage) {
        let payload = message.encode().unwrap();
        self.bus.publish(payload.into()).unwrap();
    }

    pub fn bus_publish_raw(&self, payload: &'static [u8]) {
        self.bus
            .publish(bytes::Bytes::from_static(payload))
            .unwrap();
    }
}

/// Waits for the next `state-changed` message from `from` that satisfies
/// `pred`, skipping everything else.
pub async fn next_broadcast<F>(
    inbound: &mut broadcast::Receiver<bytes::Bytes>,
    from: &str,
    pred: F,
) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            let payload = inbound.recv().await.unwrap();
            let message = BroadcastMessage::decode(&payload).unwrap();
            if message.from != from {
                continue;
            }
            if let Ok(snapshot) = message.snapshot() {
                if pred(&snapshot) {
                    return snapshot;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no matching broadcast from {from}"))
}
