use crate::terminal::{Terminal, TerminalId, WindowId};

/// Closed-terminal ids remembered so stale peers cannot resurrect them.
pub const MAX_TOMBSTONES: usize = 256;

/// Full replicated state of one window: every known terminal plus the
/// sender's own active/focused pointers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub terminals: Vec<Terminal>,
    pub active_terminal_id: Option<TerminalId>,
    pub focused_terminal_id: Option<TerminalId>,
    /// Oldest first, capped at [`MAX_TOMBSTONES`].
    pub closed: Vec<TerminalId>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    pub fn terminal(&self, id: &str) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.id.as_str() == id)
    }

    pub fn terminal_mut(&mut self, id: &str) -> Option<&mut Terminal> {
        self.terminals.iter_mut().find(|t| t.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.terminal(id).is_some()
    }

    pub fn find_by_agent(&self, agent_id: &str) -> Option<&Terminal> {
        self.terminals
            .iter()
            .find(|t| t.agent_id.as_deref() == Some(agent_id))
    }

    pub fn find_by_session(&self, session_name: &str) -> Option<&Terminal> {
        self.terminals
            .iter()
            .find(|t| t.session_name.as_deref() == Some(session_name))
    }

    pub fn owned_by<'a>(&'a self, window: &'a WindowId) -> impl Iterator<Item = &'a Terminal> {
        self.terminals.iter().filter(move |t| t.is_owned_by(window))
    }

    /// Replaces the record with the same id in place, or appends it.
    pub fn upsert(&mut self, terminal: Terminal) {
        match self.terminals.iter_mut().find(|t| t.id == terminal.id) {
            Some(slot) => *slot = terminal,
            None => self.terminals.push(terminal),
        }
    }

    /// Removes a terminal and clears any pointer naming it.
    pub fn remove(&mut self, id: &str) -> Option<Terminal> {
        let index = self.terminals.iter().position(|t| t.id.as_str() == id)?;
        if self.active_terminal_id.as_deref() == Some(id) {
            self.active_terminal_id = None;
        }
        if self.focused_terminal_id.as_deref() == Some(id) {
            self.focused_terminal_id = None;
        }
        Some(self.terminals.remove(index))
    }

    /// Removes a terminal and records a tombstone for it.
    pub fn close(&mut self, id: &str) -> Option<Terminal> {
        let removed = self.remove(id);
        self.tombstone(TerminalId::from(id));
        removed
    }

    pub fn tombstone(&mut self, id: TerminalId) {
        if self.closed.contains(&id) {
            return;
        }
        self.closed.push(id);
        if self.closed.len() > MAX_TOMBSTONES {
            let excess = self.closed.len() - MAX_TOMBSTONES;
            self.closed.drain(..excess);
        }
    }

    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.closed.iter().any(|c| c.as_str() == id)
    }
}
