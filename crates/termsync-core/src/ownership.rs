//! Ownership-based merge of a peer snapshot into local state.
//!
//! The merge never consults timestamps. A window is authoritative for the
//! lifecycle fields (`status`, `agent_id`, `window_id`) of every terminal it
//! owns while that terminal is live; everything else flows from the peer.
//! Detaching is the one lifecycle change any window may make. A closed
//! record, whether listed as a tombstone or sent with status `closed`,
//! removes the terminal.

use crate::snapshot::Snapshot;
use crate::terminal::{Terminal, TerminalId, TerminalStatus, WindowId};

/// Merges `incoming` (a peer's snapshot) into `local` for `current_window`.
///
/// Pure and deterministic: merging the same snapshot twice yields the same
/// state as merging it once, and terminals missing from `incoming` are kept.
pub fn resolve(local: &Snapshot, incoming: &Snapshot, current_window: &WindowId) -> Snapshot {
    let mut merged = local.clone();

    for id in &incoming.closed {
        let protected = local
            .terminal(id)
            .is_some_and(|t| is_protected(t, current_window));
        if !protected {
            merged.remove(id);
            merged.tombstone(id.clone());
        }
    }

    for remote in &incoming.terminals {
        if merged.is_tombstoned(&remote.id) {
            continue;
        }
        if remote.status == TerminalStatus::Closed {
            let protected = local
                .terminal(&remote.id)
                .is_some_and(|t| is_protected(t, current_window));
            if !protected {
                merged.remove(&remote.id);
                merged.tombstone(remote.id.clone());
            }
            continue;
        }
        let resolved = match local.terminal(&remote.id) {
            _ if remote.status == TerminalStatus::Detached => remote.clone(),
            Some(mine)
                if is_protected(mine, current_window) || remote.is_owned_by(current_window) =>
            {
                keep_lifecycle(remote, mine)
            }
            _ => remote.clone(),
        };
        merged.upsert(resolved);
    }

    merged.active_terminal_id = adopt_pointer(
        &merged,
        merged.active_terminal_id.clone(),
        incoming.active_terminal_id.as_ref(),
        current_window,
    );
    merged.focused_terminal_id = adopt_pointer(
        &merged,
        merged.focused_terminal_id.clone(),
        incoming.focused_terminal_id.as_ref(),
        current_window,
    );

    merged
}

/// Locally owned and live: the peer cannot touch its lifecycle fields.
fn is_protected(terminal: &Terminal, current_window: &WindowId) -> bool {
    terminal.is_owned_by(current_window) && terminal.status.is_live()
}

fn keep_lifecycle(remote: &Terminal, mine: &Terminal) -> Terminal {
    let mut resolved = remote.clone();
    resolved.status = mine.status;
    resolved.agent_id = mine.agent_id.clone();
    resolved.window_id = mine.window_id.clone();
    resolved
}

/// A peer pointer is adopted only when it names a terminal explicitly owned
/// by some other window. Unknown, unowned or locally owned targets keep the
/// local pointer.
fn adopt_pointer(
    merged: &Snapshot,
    local: Option<TerminalId>,
    incoming: Option<&TerminalId>,
    current_window: &WindowId,
) -> Option<TerminalId> {
    let Some(candidate) = incoming else {
        return local;
    };
    let owned_elsewhere = merged
        .terminal(candidate)
        .and_then(|t| t.window_id.as_ref())
        .is_some_and(|owner| owner != current_window);
    if owned_elsewhere {
        Some(candidate.clone())
    } else {
        local
    }
}
