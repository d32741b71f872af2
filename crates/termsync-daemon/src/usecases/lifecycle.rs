//! User-facing terminal lifecycle operations.
//!
//! Every operation validates against the window's current state and commits
//! through [`WindowHandle::update`], so a rejected operation changes nothing
//! and an accepted one replicates like any other local change.

use std::sync::Arc;

use termsync_core::{AgentId, Snapshot, Terminal, TerminalId, TerminalStatus, WindowId};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{LifecycleError, TransportError};
use crate::transport::{SpawnRequest, TerminalTransport};
use crate::window::WindowHandle;

pub struct TerminalLifecycle {
    handle: WindowHandle,
    transport: Arc<dyn TerminalTransport>,
    session_prefix: String,
}

fn lookup<'a>(state: &'a mut Snapshot, id: &TerminalId) -> Result<&'a mut Terminal, LifecycleError> {
    state
        .terminal_mut(id)
        .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
}

fn require_owner(terminal: &Terminal, window: &WindowId) -> Result<(), LifecycleError> {
    if terminal.status.is_live() && !terminal.is_owned_by(window) {
        return Err(LifecycleError::NotOwner {
            terminal_id: terminal.id.to_string(),
            owner: terminal.effective_owner().to_string(),
        });
    }
    Ok(())
}

fn select(state: &mut Snapshot, id: &TerminalId) {
    state.active_terminal_id = Some(id.clone());
    state.focused_terminal_id = Some(id.clone());
}

impl TerminalLifecycle {
    pub fn new(
        handle: WindowHandle,
        transport: Arc<dyn TerminalTransport>,
        session_prefix: impl Into<String>,
    ) -> Self {
        Self {
            handle,
            transport,
            session_prefix: session_prefix.into(),
        }
    }

    pub fn window_id(&self) -> &WindowId {
        self.handle.window_id()
    }

    pub async fn list(&self) -> Result<Snapshot, LifecycleError> {
        self.handle.get().await
    }

    /// Creates a terminal owned by this window and spawns its session.
    ///
    /// The record is published as `Spawning` before the transport is called
    /// and becomes `Active` once the session exists. A failed spawn closes it.
    #[tracing::instrument(skip(self), fields(window_id = %self.handle.window_id()))]
    pub async fn create(
        &self,
        terminal_type: &str,
        working_dir: Option<String>,
    ) -> Result<Terminal, LifecycleError> {
        let terminal_type = terminal_type.trim();
        if terminal_type.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "terminal type cannot be empty".to_string(),
            ));
        }

        let id = TerminalId::new(Uuid::new_v4().to_string());
        let session_name = format!("{}{}", self.session_prefix, id);
        let mut terminal = Terminal::spawning(
            id.clone(),
            self.handle.window_id().clone(),
            terminal_type,
            terminal_type,
        );
        terminal.session_name = Some(session_name.clone());
        terminal.working_dir = working_dir.clone();

        let record = terminal;
        let selected = id.clone();
        self.handle
            .update(move |state| {
                state.upsert(record);
                select(state, &selected);
                Ok(())
            })
            .await?;

        let request = SpawnRequest {
            session_name,
            terminal_type: terminal_type.to_string(),
            working_dir,
        };
        match self.transport.spawn(request).await {
            Ok(agent_id) => {
                let terminal = self.confirm(id, agent_id).await?;
                info!(terminal_id = %terminal.id, "Terminal created");
                Ok(terminal)
            }
            Err(e) => {
                warn!(terminal_id = %id, error = %e, "Spawn failed, discarding terminal");
                self.discard(id).await;
                Err(e.into())
            }
        }
    }

    /// Binds a detached terminal to this window.
    #[tracing::instrument(skip(self), fields(window_id = %self.handle.window_id()))]
    pub async fn reattach(&self, id: &str) -> Result<Terminal, LifecycleError> {
        let id = TerminalId::new(id);
        let window = self.handle.window_id().clone();
        let target = id.clone();
        let session_name = self
            .handle
            .update(move |state| {
                let terminal = lookup(state, &target)?;
                let session = terminal.session_name.clone().ok_or_else(|| {
                    LifecycleError::InvalidInput(format!(
                        "terminal {} has no session to attach",
                        target
                    ))
                })?;
                terminal.transition(TerminalStatus::Spawning)?;
                terminal.window_id = Some(window);
                select(state, &target);
                Ok(session)
            })
            .await?;

        match self.transport.attach(&session_name).await {
            Ok(agent_id) => {
                let terminal = self.confirm(id, agent_id).await?;
                info!(terminal_id = %terminal.id, "Terminal reattached");
                Ok(terminal)
            }
            Err(TransportError::SessionNotFound(session)) => {
                warn!(terminal_id = %id, session = %session, "Session is gone, closing terminal");
                self.discard(id).await;
                Err(TransportError::SessionNotFound(session).into())
            }
            Err(e) => {
                let target = id.clone();
                let _ = self
                    .handle
                    .update(move |state| {
                        lookup(state, &target)?.transition(TerminalStatus::Detached)?;
                        Ok(())
                    })
                    .await;
                Err(e.into())
            }
        }
    }

    /// Releases a terminal from its window; its session keeps running.
    ///
    /// Any window may detach any live terminal.
    #[tracing::instrument(skip(self), fields(window_id = %self.handle.window_id()))]
    pub async fn detach(&self, id: &str) -> Result<Terminal, LifecycleError> {
        let id = TerminalId::new(id);
        let terminal = self
            .handle
            .update(move |state| {
                let terminal = lookup(state, &id)?;
                terminal.transition(TerminalStatus::Detached)?;
                Ok(terminal.clone())
            })
            .await?;
        info!(terminal_id = %terminal.id, "Terminal detached");
        Ok(terminal)
    }

    /// Kills the session and removes the terminal everywhere.
    ///
    /// A live terminal may only be closed by its owner.
    #[tracing::instrument(skip(self), fields(window_id = %self.handle.window_id()))]
    pub async fn close(&self, id: &str) -> Result<(), LifecycleError> {
        let id = TerminalId::new(id);
        let window = self.handle.window_id().clone();
        let target = id.clone();
        let session = self
            .handle
            .update(move |state| {
                let terminal = lookup(state, &target)?;
                require_owner(terminal, &window)?;
                if !terminal.status.can_transition_to(TerminalStatus::Closed) {
                    return Err(LifecycleError::InvalidTransition(
                        termsync_core::TransitionError {
                            terminal_id: target.clone(),
                            from: terminal.status,
                            to: TerminalStatus::Closed,
                        },
                    ));
                }
                Ok(terminal
                    .session_name
                    .clone()
                    .or_else(|| terminal.agent_id.as_ref().map(|a| a.to_string())))
            })
            .await?;

        if let Some(session) = session {
            match self.transport.close(&session).await {
                Ok(()) | Err(TransportError::SessionNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let target = id.clone();
        self.handle
            .update(move |state| {
                state
                    .close(&target)
                    .map(|_| ())
                    .ok_or_else(|| LifecycleError::NotFound(target.to_string()))
            })
            .await?;
        info!(terminal_id = %id, "Terminal closed");
        Ok(())
    }

    /// Sets a user-chosen name and stops the reconciler from overwriting it.
    #[tracing::instrument(skip(self), fields(window_id = %self.handle.window_id()))]
    pub async fn rename(&self, id: &str, name: &str) -> Result<Terminal, LifecycleError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(LifecycleError::InvalidInput(
                "name cannot be empty".to_string(),
            ));
        }
        let id = TerminalId::new(id);
        self.handle
            .update(move |state| {
                let terminal = lookup(state, &id)?;
                terminal.name = name;
                terminal.auto_update_name = false;
                Ok(terminal.clone())
            })
            .await
    }

    pub async fn set_auto_update_name(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<Terminal, LifecycleError> {
        let id = TerminalId::new(id);
        self.handle
            .update(move |state| {
                let terminal = lookup(state, &id)?;
                terminal.auto_update_name = enabled;
                Ok(terminal.clone())
            })
            .await
    }

    /// Makes `id` this window's active and focused terminal.
    pub async fn focus(&self, id: &str) -> Result<(), LifecycleError> {
        let id = TerminalId::new(id);
        self.handle
            .update(move |state| {
                if !state.contains(&id) {
                    return Err(LifecycleError::NotFound(id.to_string()));
                }
                select(state, &id);
                Ok(())
            })
            .await
    }

    /// Activates a terminal this window started spawning. A peer may have
    /// detached and reattached it while the transport was busy; then the
    /// record belongs to that peer and is left alone.
    async fn confirm(&self, id: TerminalId, agent_id: AgentId) -> Result<Terminal, LifecycleError> {
        let window = self.handle.window_id().clone();
        self.handle
            .update(move |state| {
                let terminal = lookup(state, &id)?;
                require_owner(terminal, &window)?;
                terminal.transition(TerminalStatus::Active)?;
                terminal.agent_id = Some(agent_id);
                Ok(terminal.clone())
            })
            .await
    }

    async fn discard(&self, id: TerminalId) {
        let result = self
            .handle
            .update(move |state| {
                state.close(&id);
                Ok(())
            })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to discard terminal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::WindowConfig;
    use crate::test_support::MockTransport;
    use crate::window::WindowRuntime;

    async fn setup(window: &str) -> (TerminalLifecycle, WindowHandle, Arc<MockTransport>) {
        let config = WindowConfig::default()
            .with_window_id(window.into())
            .with_session_prefix("ctt-")
            .with_discovery_delay(Duration::from_secs(3600));
        let transport = Arc::new(MockTransport::new());
        let (runtime, handle) = WindowRuntime::new(&config, None, transport.clone());
        runtime.spawn();
        let lifecycle = TerminalLifecycle::new(handle.clone(), transport.clone(), "ctt-");
        (lifecycle, handle, transport)
    }

    fn foreign_active(id: &str, owner: &str) -> Terminal {
        let mut t = Terminal::spawning(id.into(), owner.into(), "bash", id);
        t.status = TerminalStatus::Active;
        t.agent_id = Some(format!("ctt-{id}").into());
        t.session_name = Some(format!("ctt-{id}"));
        t
    }

    #[tokio::test]
    async fn test_create_spawns_and_activates() {
        let (lifecycle, handle, transport) = setup("w1").await;

        let terminal = lifecycle.create("claude", Some("/src".into())).await.unwrap();

        assert_eq!(terminal.status, TerminalStatus::Active);
        assert_eq!(terminal.window_id.as_deref(), Some("w1"));
        let session = format!("ctt-{}", terminal.id);
        assert_eq!(terminal.session_name.as_deref(), Some(session.as_str()));
        assert_eq!(terminal.agent_id.as_deref(), Some(session.as_str()));
        assert_eq!(transport.spawned()[0].working_dir.as_deref(), Some("/src"));

        let snapshot = handle.get().await.unwrap();
        assert_eq!(snapshot.active_terminal_id.as_ref(), Some(&terminal.id));
        assert_eq!(snapshot.focused_terminal_id.as_ref(), Some(&terminal.id));
    }

    #[tokio::test]
    async fn test_create_is_spawning_until_transport_answers() {
        let (lifecycle, handle, transport) = setup("w1").await;
        transport.set_spawn_delay(Duration::from_millis(100));
        let lifecycle = Arc::new(lifecycle);

        let task = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.create("bash", None).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        let snapshot = handle.get().await.unwrap();
        assert_eq!(snapshot.terminals[0].status, TerminalStatus::Spawning);

        let terminal = task.await.unwrap().unwrap();
        assert_eq!(terminal.status, TerminalStatus::Active);
    }

    #[tokio::test]
    async fn test_create_does_not_activate_terminal_taken_over_by_peer() {
        let (lifecycle, handle, transport) = setup("w1").await;
        transport.set_spawn_delay(Duration::from_millis(100));
        let lifecycle = Arc::new(lifecycle);

        let task = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.create("bash", None).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        let id = handle.get().await.unwrap().terminals[0].id.clone();

        // Merged state after w2 detaches the terminal and then reattaches it.
        let target = id.clone();
        handle
            .apply(move |s| {
                s.terminal_mut(&target)
                    .unwrap()
                    .transition(TerminalStatus::Detached)
                    .unwrap();
            })
            .await
            .unwrap();
        let target = id.clone();
        handle
            .apply(move |s| {
                let t = s.terminal_mut(&target).unwrap();
                t.status = TerminalStatus::Spawning;
                t.window_id = Some("w2".into());
            })
            .await
            .unwrap();

        let err = task.await.unwrap().unwrap_err();

        assert!(matches!(err, LifecycleError::NotOwner { ref owner, .. } if owner == "w2"));
        let snapshot = handle.get().await.unwrap();
        let terminal = snapshot.terminal(&id).unwrap();
        assert_eq!(terminal.status, TerminalStatus::Spawning);
        assert_eq!(terminal.window_id.as_deref(), Some("w2"));
        assert!(terminal.agent_id.is_none());
    }

    #[tokio::test]
    async fn test_reattach_is_not_confirmed_after_peer_detach() {
        let (lifecycle, handle, transport) = setup("w2").await;
        transport.add_session("ctt-t1");
        transport.set_attach_delay(Duration::from_millis(100));
        handle
            .apply(|s| s.upsert(Terminal::detached("t1".into(), "bash", "t1", "ctt-t1")))
            .await
            .unwrap();
        let lifecycle = Arc::new(lifecycle);

        let task = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.reattach("t1").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle
            .apply(|s| {
                s.terminal_mut("t1")
                    .unwrap()
                    .transition(TerminalStatus::Detached)
                    .unwrap();
            })
            .await
            .unwrap();

        assert!(task.await.unwrap().is_err());
        let snapshot = handle.get().await.unwrap();
        let terminal = snapshot.terminal("t1").unwrap();
        assert_eq!(terminal.status, TerminalStatus::Detached);
        assert!(terminal.agent_id.is_none());
    }

    #[tokio::test]
    async fn test_failed_spawn_leaves_only_a_tombstone() {
        let (lifecycle, handle, transport) = setup("w1").await;
        transport.fail_spawn("tmux missing");

        let err = lifecycle.create("bash", None).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Transport(TransportError::Spawn { .. })));
        let snapshot = handle.get().await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.closed.len(), 1);
        assert!(snapshot.active_terminal_id.is_none());
    }

    #[tokio::test]
    async fn test_empty_type_rejected() {
        let (lifecycle, _handle, transport) = setup("w1").await;
        assert!(matches!(
            lifecycle.create("  ", None).await,
            Err(LifecycleError::InvalidInput(_))
        ));
        assert!(transport.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_detach_then_reattach_elsewhere() {
        let (lifecycle, handle, transport) = setup("w2").await;
        transport.add_session("ctt-t1");
        handle
            .apply(|s| s.upsert(foreign_active("t1", "w1")))
            .await
            .unwrap();

        let detached = lifecycle.detach("t1").await.unwrap();
        assert_eq!(detached.status, TerminalStatus::Detached);
        assert!(detached.window_id.is_none());
        assert!(detached.agent_id.is_none());

        let attached = lifecycle.reattach("t1").await.unwrap();
        assert_eq!(attached.status, TerminalStatus::Active);
        assert_eq!(attached.window_id.as_deref(), Some("w2"));
        assert_eq!(attached.agent_id.as_deref(), Some("ctt-t1"));
    }

    #[tokio::test]
    async fn test_reattach_requires_detached() {
        let (lifecycle, handle, _transport) = setup("w1").await;
        handle
            .apply(|s| s.upsert(foreign_active("t1", "w1")))
            .await
            .unwrap();

        assert!(matches!(
            lifecycle.reattach("t1").await,
            Err(LifecycleError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_reattach_to_vanished_session_closes_terminal() {
        let (lifecycle, handle, _transport) = setup("w1").await;
        handle
            .apply(|s| s.upsert(Terminal::detached("t1".into(), "bash", "t1", "ctt-t1")))
            .await
            .unwrap();

        let err = lifecycle.reattach("t1").await.unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Transport(TransportError::SessionNotFound(_))
        ));
        let snapshot = handle.get().await.unwrap();
        assert!(!snapshot.contains("t1"));
        assert!(snapshot.is_tombstoned("t1"));
    }

    #[tokio::test]
    async fn test_close_requires_owner_while_live() {
        let (lifecycle, handle, transport) = setup("w2").await;
        transport.add_session("ctt-t1");
        handle
            .apply(|s| s.upsert(foreign_active("t1", "w1")))
            .await
            .unwrap();

        let err = lifecycle.close("t1").await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotOwner { .. }));
        assert!(transport.has_session("ctt-t1"));

        lifecycle.detach("t1").await.unwrap();
        lifecycle.close("t1").await.unwrap();
        assert!(!transport.has_session("ctt-t1"));
        assert!(handle.get().await.unwrap().is_tombstoned("t1"));
    }

    #[tokio::test]
    async fn test_close_keeps_terminal_when_kill_fails() {
        let (lifecycle, handle, transport) = setup("w1").await;
        let terminal = lifecycle.create("bash", None).await.unwrap();
        transport.fail_close("permission denied");

        assert!(lifecycle.close(terminal.id.as_str()).await.is_err());
        assert!(handle.get().await.unwrap().contains(terminal.id.as_str()));
    }

    #[tokio::test]
    async fn test_rename_pins_the_name() {
        let (lifecycle, _handle, _transport) = setup("w1").await;
        let terminal = lifecycle.create("bash", None).await.unwrap();

        let renamed = lifecycle.rename(terminal.id.as_str(), " build ").await.unwrap();
        assert_eq!(renamed.name, "build");
        assert!(!renamed.auto_update_name);

        let resumed = lifecycle
            .set_auto_update_name(terminal.id.as_str(), true)
            .await
            .unwrap();
        assert!(resumed.auto_update_name);
        assert!(lifecycle.rename(terminal.id.as_str(), "").await.is_err());
    }

    #[tokio::test]
    async fn test_focus_unknown_terminal() {
        let (lifecycle, handle, _transport) = setup("w1").await;
        assert!(matches!(
            lifecycle.focus("ghost").await,
            Err(LifecycleError::NotFound(_))
        ));
        let first = lifecycle.create("bash", None).await.unwrap();
        let _second = lifecycle.create("bash", None).await.unwrap();

        lifecycle.focus(first.id.as_str()).await.unwrap();
        assert_eq!(
            handle.get().await.unwrap().focused_terminal_id.as_ref(),
            Some(&first.id)
        );
    }
}
