use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use termsync_core::AgentId;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{SessionListing, SpawnRequest, TerminalTransport, TransportNotice, diff_sessions};
use crate::error::TransportError;

const LIST_FORMAT: &str = "#{session_name}\t#{pane_current_path}";

/// Stderr fragments tmux prints when the server or session does not exist.
const MISSING_MARKERS: &[&str] = &[
    "can't find session",
    "no server running",
    "error connecting",
    "no sessions",
];

/// Transport backed by detached tmux sessions named `<prefix><terminal id>`.
pub struct TmuxTransport {
    prefix: String,
    socket_name: Option<String>,
    notices: broadcast::Sender<TransportNotice>,
}

impl TmuxTransport {
    pub fn new(prefix: impl Into<String>, capacity: usize) -> Self {
        let (notices, _) = broadcast::channel(capacity.max(1));
        Self {
            prefix: prefix.into(),
            socket_name: None,
            notices,
        }
    }

    /// Runs against a private tmux server (`tmux -L <name>`).
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket_name = Some(name.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("tmux");
        if let Some(name) = &self.socket_name {
            cmd.args(["-L", name]);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, operation: &str, args: &[&str]) -> Result<Output, TransportError> {
        self.command()
            .args(args)
            .output()
            .await
            .map_err(|e| TransportError::Command {
                operation: operation.to_string(),
                reason: e.to_string(),
            })
    }

    /// Polls `list-sessions` and publishes the differences as notices until
    /// the returned guard is dropped.
    pub fn watch(self: &Arc<Self>, interval: Duration) -> WatchGuard {
        let transport = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut known = transport.list_sessions().await.unwrap_or_default();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let current = match transport.list_sessions().await {
                    Ok(current) => current,
                    Err(e) => {
                        debug!(error = %e, "Session poll failed");
                        continue;
                    }
                };
                for notice in diff_sessions(&known, &current) {
                    debug!(?notice, "Session change");
                    let _ = transport.notices.send(notice);
                }
                known = current;
            }
        });
        WatchGuard(task)
    }
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn is_missing(stderr: &str) -> bool {
    MISSING_MARKERS.iter().any(|m| stderr.contains(m))
}

/// Program to start inside a new session; `None` keeps tmux's default shell.
fn command_for(terminal_type: &str) -> Option<&str> {
    match terminal_type {
        "" | "bash" | "shell" | "sh" | "zsh" => None,
        "claude" | "claude-code" => Some("claude"),
        other => Some(other),
    }
}

fn parse_sessions(stdout: &str, prefix: &str) -> Vec<SessionListing> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(2, '\t');
            let name = parts.next()?.trim();
            if name.is_empty() || !name.starts_with(prefix) {
                return None;
            }
            let working_dir = parts
                .next()
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(str::to_string);
            Some(SessionListing {
                session_name: name.to_string(),
                working_dir,
            })
        })
        .collect()
}

#[async_trait]
impl TerminalTransport for TmuxTransport {
    async fn spawn(&self, request: SpawnRequest) -> Result<AgentId, TransportError> {
        let mut args = vec!["new-session", "-d", "-s", request.session_name.as_str()];
        if let Some(dir) = request.working_dir.as_deref() {
            args.extend(["-c", dir]);
        }
        if let Some(program) = command_for(&request.terminal_type) {
            args.push(program);
        }

        let output = self.run("spawn", &args).await?;
        if !output.status.success() {
            return Err(TransportError::Spawn {
                session: request.session_name,
                reason: stderr_text(&output),
            });
        }
        info!(session = %request.session_name, "Spawned tmux session");
        Ok(AgentId::new(request.session_name))
    }

    async fn attach(&self, session_name: &str) -> Result<AgentId, TransportError> {
        let target = format!("={session_name}");
        let output = self.run("attach", &["has-session", "-t", &target]).await?;
        if output.status.success() {
            return Ok(AgentId::new(session_name));
        }
        let stderr = stderr_text(&output);
        if stderr.is_empty() || is_missing(&stderr) {
            return Err(TransportError::SessionNotFound(session_name.to_string()));
        }
        Err(TransportError::Command {
            operation: "attach".to_string(),
            reason: stderr,
        })
    }

    async fn close(&self, session_name: &str) -> Result<(), TransportError> {
        let target = format!("={session_name}");
        let output = self.run("close", &["kill-session", "-t", &target]).await?;
        if output.status.success() {
            info!(session = %session_name, "Killed tmux session");
            return Ok(());
        }
        let stderr = stderr_text(&output);
        if is_missing(&stderr) {
            return Err(TransportError::SessionNotFound(session_name.to_string()));
        }
        Err(TransportError::Command {
            operation: "close".to_string(),
            reason: stderr,
        })
    }

    async fn list_sessions(&self) -> Result<Vec<SessionListing>, TransportError> {
        let output = self
            .run("list", &["list-sessions", "-F", LIST_FORMAT])
            .await?;
        if !output.status.success() {
            let stderr = stderr_text(&output);
            if is_missing(&stderr) {
                return Ok(Vec::new());
            }
            return Err(TransportError::Command {
                operation: "list".to_string(),
                reason: stderr,
            });
        }
        Ok(parse_sessions(
            &String::from_utf8_lossy(&output.stdout),
            &self.prefix,
        ))
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportNotice> {
        self.notices.subscribe()
    }
}

/// Stops the session watcher when dropped.
pub struct WatchGuard(JoinHandle<()>);

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
