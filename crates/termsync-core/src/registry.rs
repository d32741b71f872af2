//! The per-window terminal registry.
//!
//! Every change goes through [`TerminalRegistry::apply`] (local mutations) or
//! [`TerminalRegistry::replace`] (merged remote state). Observers see both,
//! tagged with a [`ChangeOrigin`], which is how the replicator knows what to
//! publish and what to leave alone.

use crate::snapshot::Snapshot;
use crate::terminal::WindowId;

/// Where a registry change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A local mutation (user action, lifecycle use case or reconciler).
    Local,
    /// A merged peer snapshot or a re-initialisation; never re-published.
    Remote,
}

pub trait RegistryObserver: Send {
    fn snapshot_changed(&self, snapshot: &Snapshot, origin: ChangeOrigin);
}

pub struct TerminalRegistry {
    window_id: WindowId,
    state: Snapshot,
    revision: u64,
    observers: Vec<Box<dyn RegistryObserver>>,
}

impl TerminalRegistry {
    pub fn new(window_id: WindowId) -> Self {
        Self {
            window_id,
            state: Snapshot::default(),
            revision: 0,
            observers: Vec::new(),
        }
    }

    pub fn window_id(&self) -> &WindowId {
        &self.window_id
    }

    pub fn observe(&mut self, observer: Box<dyn RegistryObserver>) {
        self.observers.push(observer);
    }

    /// Number of changes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self) -> Snapshot {
        self.state.clone()
    }

    pub fn view(&self) -> &Snapshot {
        &self.state
    }

    pub fn apply<F>(&mut self, mutator: F) -> Snapshot
    where
        F: FnOnce(&mut Snapshot),
    {
        mutator(&mut self.state);
        self.commit(ChangeOrigin::Local)
    }

    pub fn replace(&mut self, snapshot: Snapshot) -> Snapshot {
        self.state = snapshot;
        self.commit(ChangeOrigin::Remote)
    }

    fn commit(&mut self, origin: ChangeOrigin) -> Snapshot {
        self.revision += 1;
        for observer in &self.observers {
            observer.snapshot_changed(&self.state, origin);
        }
        self.state.clone()
    }
}

impl std::fmt::Debug for TerminalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalRegistry")
            .field("window_id", &self.window_id)
            .field("revision", &self.revision)
            .field("terminals", &self.state.terminals.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}
