//! Publishes local registry changes and merges peer snapshots.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use termsync_common::mutex_lock_or_recover;
use termsync_core::{
    ChangeOrigin, RegistryObserver, Snapshot, TerminalRegistry, WindowId, resolve,
};
use termsync_ipc::{BroadcastMessage, MessageKind};
use tracing::{debug, info, warn};

use crate::bus::BroadcastChannel;
use crate::error::BusError;

/// What [`Replicator::receive`] did with one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Our own message came back.
    Echo,
    Merged {
        from: String,
        changed: bool,
        /// First message seen from this window since start or reload.
        new_peer: bool,
    },
    ReloadRequested {
        from: String,
    },
    Rejected,
}

pub struct Replicator {
    window_id: WindowId,
    bus: Option<Arc<dyn BroadcastChannel>>,
    max_message_bytes: usize,
    degraded: AtomicBool,
    known_peers: Mutex<HashSet<String>>,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Replicator {
    pub fn new(
        window_id: WindowId,
        bus: Option<Arc<dyn BroadcastChannel>>,
        max_message_bytes: usize,
    ) -> Self {
        if bus.is_none() {
            warn!(window_id = %window_id, "No broadcast channel, running in single-window mode");
        }
        Self {
            window_id,
            bus,
            max_message_bytes,
            degraded: AtomicBool::new(false),
            known_peers: Mutex::new(HashSet::new()),
        }
    }

    pub fn window_id(&self) -> &WindowId {
        &self.window_id
    }

    /// Whether publishes currently reach the channel.
    pub fn is_connected(&self) -> bool {
        self.bus.is_some() && !self.degraded.load(Ordering::Relaxed)
    }

    /// Registry observer that publishes every local change.
    pub fn observer(self: &Arc<Self>) -> Box<dyn RegistryObserver> {
        Box::new(ReplicationObserver {
            replicator: Arc::clone(self),
        })
    }

    pub fn publish_state(&self, snapshot: &Snapshot) -> bool {
        self.publish(BroadcastMessage::state_changed(
            snapshot,
            self.window_id.as_str(),
            now_millis(),
        ))
    }

    pub fn publish_reload(&self) -> bool {
        self.publish(BroadcastMessage::reload_all(
            self.window_id.as_str(),
            now_millis(),
        ))
    }

    /// Fire-and-forget. Failures are logged and the message is dropped; the
    /// caller's local state is never rolled back.
    fn publish(&self, message: BroadcastMessage) -> bool {
        let Some(bus) = &self.bus else {
            return false;
        };

        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode broadcast, dropping it");
                return false;
            }
        };
        if payload.len() > self.max_message_bytes {
            warn!(
                bytes = payload.len(),
                max_bytes = self.max_message_bytes,
                "Broadcast exceeds size limit, dropping it"
            );
            return false;
        }

        match bus.publish(Bytes::from(payload)) {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    info!("Broadcast channel available again");
                }
                true
            }
            Err(BusError::Full) => {
                debug!("Broadcast queue full, dropping state");
                false
            }
            Err(e) => {
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!(error = %e, "Broadcast channel unavailable, continuing in single-window mode");
                }
                false
            }
        }
    }

    /// Handles one inbound payload.
    ///
    /// Peer state is merged with [`resolve`] and installed with
    /// [`TerminalRegistry::replace`], so it is never re-published.
    pub fn receive(&self, registry: &mut TerminalRegistry, payload: &[u8]) -> ReceiveOutcome {
        let message = match BroadcastMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed broadcast");
                return ReceiveOutcome::Rejected;
            }
        };

        if message.from == self.window_id.as_str() {
            return ReceiveOutcome::Echo;
        }
        let new_peer = mutex_lock_or_recover(&self.known_peers).insert(message.from.clone());

        match message.kind {
            MessageKind::ReloadAll => {
                info!(from = %message.from, "Reload requested by peer");
                ReceiveOutcome::ReloadRequested { from: message.from }
            }
            MessageKind::StateChanged => {
                let incoming = match message.snapshot() {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!(from = %message.from, error = %e, "Ignoring invalid peer state");
                        return ReceiveOutcome::Rejected;
                    }
                };
                let merged = resolve(registry.view(), &incoming, &self.window_id);
                let changed = merged != *registry.view();
                if changed {
                    registry.replace(merged);
                }
                debug!(from = %message.from, changed, new_peer, "Merged peer state");
                ReceiveOutcome::Merged {
                    from: message.from,
                    changed,
                    new_peer,
                }
            }
        }
    }

    /// Forgets every peer so the next message from each counts as new.
    pub fn forget_peers(&self) {
        mutex_lock_or_recover(&self.known_peers).clear();
    }
}

struct ReplicationObserver {
    replicator: Arc<Replicator>,
}

impl RegistryObserver for ReplicationObserver {
    fn snapshot_changed(&self, snapshot: &Snapshot, origin: ChangeOrigin) {
        if origin == ChangeOrigin::Local {
            self.replicator.publish_state(snapshot);
        }
    }
}
