//! The per-window actor.
//!
//! [`WindowRuntime`] owns the registry. Local commands, inbound broadcasts and
//! transport notices are handled one at a time on its task, so a merge or a
//! lifecycle step is never observed half-applied. Everything else talks to it
//! through a cloneable [`WindowHandle`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use termsync_core::{Snapshot, Terminal, TerminalId, TerminalRegistry, WindowId};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::bus::BroadcastChannel;
use crate::config::WindowConfig;
use crate::error::LifecycleError;
use crate::replicator::{ReceiveOutcome, Replicator};
use crate::transport::{SessionListing, TerminalTransport, TransportNotice};

/// Terminal type recorded for sessions adopted without a known origin.
pub const ORPHAN_TERMINAL_TYPE: &str = "tmux";

type Job = Box<dyn FnOnce(&mut TerminalRegistry) + Send>;

enum WindowCommand {
    Run(Job),
    Reload(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable access to a running window.
#[derive(Clone)]
pub struct WindowHandle {
    window_id: WindowId,
    commands: mpsc::Sender<WindowCommand>,
}

impl WindowHandle {
    pub fn window_id(&self) -> &WindowId {
        &self.window_id
    }

    async fn run<T, F>(&self, job: F) -> Result<T, LifecycleError>
    where
        T: Send + 'static,
        F: FnOnce(&mut TerminalRegistry) -> T + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |registry| {
            let _ = reply.send(job(registry));
        });
        self.commands
            .send(WindowCommand::Run(job))
            .await
            .map_err(|_| LifecycleError::WindowClosed)?;
        result.await.map_err(|_| LifecycleError::WindowClosed)
    }

    pub async fn get(&self) -> Result<Snapshot, LifecycleError> {
        self.run(|registry| registry.get()).await
    }

    /// Applies `mutator` as a local change and returns the new snapshot.
    pub async fn apply<F>(&self, mutator: F) -> Result<Snapshot, LifecycleError>
    where
        F: FnOnce(&mut Snapshot) + Send + 'static,
    {
        self.run(move |registry| registry.apply(mutator)).await
    }

    /// Runs `f` against a draft of the state. On `Ok` the draft becomes a
    /// local change (if it differs); on `Err` nothing changes.
    pub async fn update<T, F>(&self, f: F) -> Result<T, LifecycleError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Snapshot) -> Result<T, LifecycleError> + Send + 'static,
    {
        self.run(move |registry| {
            let mut draft = registry.get();
            let value = f(&mut draft)?;
            if draft != *registry.view() {
                registry.apply(move |state| *state = draft);
            }
            Ok(value)
        })
        .await?
    }

    /// Tells every window, this one included, to re-initialise.
    pub async fn reload_all(&self) -> Result<(), LifecycleError> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(WindowCommand::Reload(done))
            .await
            .map_err(|_| LifecycleError::WindowClosed)?;
        finished.await.map_err(|_| LifecycleError::WindowClosed)
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(WindowCommand::Shutdown).await;
    }
}

impl std::fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowHandle")
            .field("window_id", &self.window_id)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

pub struct WindowRuntime {
    registry: TerminalRegistry,
    replicator: Arc<Replicator>,
    transport: Arc<dyn TerminalTransport>,
    session_prefix: String,
    discovery_delay: Duration,
    commands: mpsc::Receiver<WindowCommand>,
    inbound: Option<broadcast::Receiver<Bytes>>,
    notices: Option<broadcast::Receiver<TransportNotice>>,
    // Keeps the bus (and its socket tasks) alive for as long as the window.
    _bus: Option<Arc<dyn BroadcastChannel>>,
}

impl WindowRuntime {
    pub fn new(
        config: &WindowConfig,
        bus: Option<Arc<dyn BroadcastChannel>>,
        transport: Arc<dyn TerminalTransport>,
    ) -> (Self, WindowHandle) {
        let window_id = config.window_id.clone();
        let replicator = Arc::new(Replicator::new(
            window_id.clone(),
            bus.clone(),
            config.max_message_bytes,
        ));
        let mut registry = TerminalRegistry::new(window_id.clone());
        registry.observe(replicator.observer());

        let (commands_tx, commands) = mpsc::channel(config.channel_capacity.max(1));
        let inbound = bus.as_ref().map(|bus| bus.subscribe());
        let notices = Some(transport.subscribe());

        let runtime = Self {
            registry,
            replicator,
            transport,
            session_prefix: config.session_prefix.clone(),
            discovery_delay: config.discovery_delay,
            commands,
            inbound,
            notices,
            _bus: bus,
        };
        let handle = WindowHandle {
            window_id,
            commands: commands_tx,
        };
        (runtime, handle)
    }

    pub fn replicator(&self) -> Arc<Replicator> {
        Arc::clone(&self.replicator)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!(
            window_id = %self.registry.window_id(),
            connected = self.replicator.is_connected(),
            "Window started"
        );
        self.announce();

        let discovery = tokio::time::sleep(self.discovery_delay);
        tokio::pin!(discovery);
        let mut discovery_pending = true;

        loop {
            let mut reload = false;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(WindowCommand::Run(job)) => job(&mut self.registry),
                    Some(WindowCommand::Reload(done)) => {
                        self.replicator.publish_reload();
                        self.reset();
                        discovery.as_mut().reset(Instant::now() + self.discovery_delay);
                        discovery_pending = true;
                        let _ = done.send(());
                    }
                    Some(WindowCommand::Shutdown) | None => break,
                },
                inbound = next_message(&mut self.inbound) => {
                    reload = self.handle_inbound(inbound);
                }
                notice = next_message(&mut self.notices) => self.handle_notice(notice),
                () = &mut discovery, if discovery_pending => {
                    discovery_pending = false;
                    self.discover().await;
                }
            }

            if reload {
                self.reset();
                discovery.as_mut().reset(Instant::now() + self.discovery_delay);
                discovery_pending = true;
            }
        }

        info!(window_id = %self.registry.window_id(), "Window stopped");
    }

    /// Publishes current state so peers learn about this window.
    fn announce(&self) {
        self.replicator.publish_state(self.registry.view());
    }

    /// Drops all state and starts over as a fresh window.
    fn reset(&mut self) {
        info!(window_id = %self.registry.window_id(), "Re-initialising window state");
        self.registry.replace(Snapshot::default());
        self.replicator.forget_peers();
        self.announce();
    }

    /// Returns `true` when a peer asked for a reload.
    fn handle_inbound(&mut self, inbound: Result<Bytes, RecvError>) -> bool {
        match inbound {
            Ok(payload) => match self.replicator.receive(&mut self.registry, &payload) {
                ReceiveOutcome::Merged { new_peer: true, from, .. } => {
                    debug!(peer = %from, "New peer, sending our state");
                    self.announce();
                    false
                }
                ReceiveOutcome::ReloadRequested { .. } => true,
                _ => false,
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed broadcasts; the next peer update carries full state");
                false
            }
            Err(RecvError::Closed) => {
                warn!("Broadcast channel closed, continuing in single-window mode");
                self.inbound = None;
                false
            }
        }
    }

    fn handle_notice(&mut self, notice: Result<TransportNotice, RecvError>) {
        match notice {
            Ok(TransportNotice::Spawned(listing)) => {
                let adopted = adopt_orphans(self.registry.view(), &[listing], &self.session_prefix);
                if !adopted.is_empty() {
                    info!(count = adopted.len(), "Adopted externally spawned session");
                    self.registry.apply(move |state| {
                        for terminal in adopted {
                            state.upsert(terminal);
                        }
                    });
                }
            }
            Ok(TransportNotice::Closed { session_name }) => {
                let window = self.registry.window_id().clone();
                let target = self
                    .registry
                    .view()
                    .terminals
                    .iter()
                    .find(|t| {
                        t.session_name.as_deref() == Some(session_name.as_str())
                            || t.agent_id.as_deref() == Some(session_name.as_str())
                    })
                    .filter(|t| !t.status.is_live() || t.is_owned_by(&window))
                    .map(|t| t.id.clone());
                if let Some(id) = target {
                    info!(terminal_id = %id, session = %session_name, "Backing session ended, closing terminal");
                    self.registry.apply(move |state| {
                        state.close(&id);
                    });
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed transport notices");
            }
            Err(RecvError::Closed) => {
                debug!("Transport notices closed");
                self.notices = None;
            }
        }
    }

    async fn discover(&mut self) {
        let sessions = match self.transport.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "Orphan discovery failed");
                return;
            }
        };
        let adopted = adopt_orphans(self.registry.view(), &sessions, &self.session_prefix);
        if adopted.is_empty() {
            debug!(sessions = sessions.len(), "No orphaned sessions");
            return;
        }
        info!(count = adopted.len(), "Adopted orphaned sessions");
        self.registry.apply(move |state| {
            for terminal in adopted {
                state.upsert(terminal);
            }
        });
    }
}

async fn next_message<T: Clone>(
    receiver: &mut Option<broadcast::Receiver<T>>,
) -> Result<T, RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

/// Detached records for prefixed sessions the snapshot does not know.
///
/// The terminal id is the session name minus the prefix, so every window
/// adopting the same session agrees on its id. Closed ids stay closed.
pub fn adopt_orphans(
    snapshot: &Snapshot,
    sessions: &[SessionListing],
    prefix: &str,
) -> Vec<Terminal> {
    sessions
        .iter()
        .filter_map(|listing| {
            let name = listing.session_name.as_str();
            let id = name.strip_prefix(prefix).filter(|id| !id.is_empty())?;
            let known = snapshot.contains(id)
                || snapshot.is_tombstoned(id)
                || snapshot.find_by_session(name).is_some()
                || snapshot.find_by_agent(name).is_some();
            if known {
                return None;
            }
            let mut terminal =
                Terminal::detached(TerminalId::new(id), ORPHAN_TERMINAL_TYPE, name, name);
            terminal.working_dir = listing.working_dir.clone();
            Some(terminal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use crate::test_support::MockTransport;
    use termsync_core::TerminalStatus;
    use termsync_ipc::BroadcastMessage;

    fn config(window: &str) -> WindowConfig {
        WindowConfig::default()
            .with_window_id(window.into())
            .with_session_prefix("ctt-")
            .with_discovery_delay(Duration::from_millis(10))
    }

    fn active(id: &str, window: &str) -> Terminal {
        let mut t = Terminal::spawning(id.into(), window.into(), "bash", id);
        t.status = TerminalStatus::Active;
        t.agent_id = Some(format!("ctt-{id}").into());
        t.session_name = Some(format!("ctt-{id}"));
        t
    }

    #[test]
    fn test_adopt_orphans_skips_known_and_closed() {
        let mut snapshot = Snapshot::default();
        snapshot.upsert(active("a", "w1"));
        snapshot.tombstone("b".into());
        let sessions = vec![
            SessionListing::new("ctt-a"),
            SessionListing::new("ctt-b"),
            SessionListing {
                session_name: "ctt-c".into(),
                working_dir: Some("/src".into()),
            },
            SessionListing::new("ctt-"),
            SessionListing::new("other"),
        ];

        let adopted = adopt_orphans(&snapshot, &sessions, "ctt-");

        assert_eq!(adopted.len(), 1);
        assert_eq!(adopted[0].id.as_str(), "c");
        assert_eq!(adopted[0].status, TerminalStatus::Detached);
        assert_eq!(adopted[0].session_name.as_deref(), Some("ctt-c"));
        assert_eq!(adopted[0].working_dir.as_deref(), Some("/src"));
    }

    #[tokio::test]
    async fn test_update_error_leaves_state_untouched() {
        let transport = Arc::new(MockTransport::new());
        let (runtime, handle) = WindowRuntime::new(&config("w1"), None, transport);
        let task = runtime.spawn();

        handle.apply(|s| s.upsert(active("t1", "w1"))).await.unwrap();
        let result: Result<(), _> = handle
            .update(|s| {
                s.remove("t1");
                Err(LifecycleError::InvalidInput("nope".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(handle.get().await.unwrap().contains("t1"));
        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_discovery_adopts_existing_sessions() {
        let transport = Arc::new(MockTransport::new());
        transport.add_session("ctt-orphan");
        let (runtime, handle) = WindowRuntime::new(&config("w1"), None, transport);
        let task = runtime.spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = handle.get().await.unwrap();
        let orphan = snapshot.terminal("orphan").unwrap();
        assert_eq!(orphan.status, TerminalStatus::Detached);
        assert!(orphan.window_id.is_none());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_external_close_of_owned_terminal() {
        let transport = Arc::new(MockTransport::new());
        let (runtime, handle) = WindowRuntime::new(&config("w1"), None, transport.clone());
        let task = runtime.spawn();

        handle
            .apply(|s| {
                s.upsert(active("mine", "w1"));
                s.upsert(active("theirs", "w2"));
            })
            .await
            .unwrap();
        transport.notify(TransportNotice::Closed {
            session_name: "ctt-mine".into(),
        });
        transport.notify(TransportNotice::Closed {
            session_name: "ctt-theirs".into(),
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snapshot = handle.get().await.unwrap();
        assert!(!snapshot.contains("mine"));
        assert!(snapshot.is_tombstoned("mine"));
        assert!(snapshot.contains("theirs"));

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_reload_resets_and_rediscovers() {
        let bus = LocalBus::new(16);
        let bus_dyn: Arc<dyn BroadcastChannel> = Arc::new(bus.clone());
        let transport = Arc::new(MockTransport::new());
        transport.add_session("ctt-t1");
        let (runtime, handle) = WindowRuntime::new(&config("w1"), Some(bus_dyn), transport);
        let task = runtime.spawn();

        handle.apply(|s| s.upsert(active("t1", "w1"))).await.unwrap();
        let reload = BroadcastMessage::reload_all("cli", 0).encode().unwrap();
        bus.publish(Bytes::from(reload)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let snapshot = handle.get().await.unwrap();
        let t1 = snapshot.terminal("t1").unwrap();
        assert_eq!(t1.status, TerminalStatus::Detached);
        assert!(t1.window_id.is_none());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_closed_window() {
        let transport = Arc::new(MockTransport::new());
        let (runtime, handle) = WindowRuntime::new(&config("w1"), None, transport);
        let task = runtime.spawn();
        handle.shutdown().await;
        task.await.unwrap();

        assert!(matches!(
            handle.get().await,
            Err(LifecycleError::WindowClosed)
        ));
    }
}
