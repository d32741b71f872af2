use serde::{Deserialize, Serialize};
use termsync_core::Snapshot;

use crate::{IpcError, SnapshotDto};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    StateChanged,
    ReloadAll,
}

/// One message on the cross-window channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SnapshotDto>,
    /// Sender's window id, used for echo suppression.
    pub from: String,
    /// Milliseconds since the Unix epoch.
    pub at: i64,
}

impl BroadcastMessage {
    pub fn state_changed(snapshot: &Snapshot, from: impl Into<String>, at: i64) -> Self {
        Self {
            kind: MessageKind::StateChanged,
            state: Some(SnapshotDto::from(snapshot)),
            from: from.into(),
            at,
        }
    }

    pub fn reload_all(from: impl Into<String>, at: i64) -> Self {
        Self {
            kind: MessageKind::ReloadAll,
            state: None,
            from: from.into(),
            at,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, IpcError> {
        serde_json::to_vec(self).map_err(IpcError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IpcError> {
        serde_json::from_slice(bytes).map_err(|e| IpcError::Decode(e.to_string()))
    }

    /// Converts the carried state into a domain snapshot.
    ///
    /// A `state-changed` message without state is malformed.
    pub fn snapshot(&self) -> Result<Snapshot, IpcError> {
        match &self.state {
            Some(dto) => Snapshot::try_from(dto.clone()),
            None => Err(IpcError::InvalidSnapshot(
                "state-changed message carries no state".to_string(),
            )),
        }
    }
}
