//! Cross-window broadcast channel.
//!
//! Every implementation delivers each published payload to every subscriber,
//! the publisher included. Echo suppression is the replicator's job.

mod hub;
mod relay;

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::error::BusError;

pub use hub::HubBus;
pub use relay::HubServer;

pub trait BroadcastChannel: Send + Sync {
    /// Fire-and-forget publish of one encoded message.
    fn publish(&self, payload: Bytes) -> Result<(), BusError>;

    /// A fresh subscription. The receiver reports `Closed` once the channel
    /// can deliver nothing more.
    fn subscribe(&self) -> broadcast::Receiver<Bytes>;
}

/// In-process bus for tests and single-process multi-window setups.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<Bytes>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BroadcastChannel for LocalBus {
    fn publish(&self, payload: Bytes) -> Result<(), BusError> {
        self.sender
            .send(payload)
            .map(|_| ())
            .map_err(|_| BusError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.sender.subscribe()
    }
}
