//! Shared builders for core unit tests.

use crate::snapshot::Snapshot;
use crate::terminal::{Terminal, TerminalStatus};

pub fn active_terminal(id: &str, window: &str) -> Terminal {
    let mut terminal = Terminal::spawning(id.into(), window.into(), "bash", "bash");
    terminal.status = TerminalStatus::Active;
    terminal.agent_id = Some(format!("agent-{id}").into());
    terminal.session_name = Some(format!("ctt-{id}"));
    terminal
}

pub fn spawning_terminal(id: &str, window: &str) -> Terminal {
    Terminal::spawning(id.into(), window.into(), "bash", "bash")
}

pub fn detached_terminal(id: &str) -> Terminal {
    Terminal::detached(id.into(), "bash", "bash", format!("ctt-{id}"))
}

pub fn snapshot_of(terminals: Vec<Terminal>) -> Snapshot {
    Snapshot {
        terminals,
        ..Snapshot::default()
    }
}
