//! Response bodies of the external status sidecar.

use serde::Deserialize;

/// `GET /api/claude-status?dir=..&sessionName=..`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_activity: Option<String>,
    #[serde(default)]
    pub last_updated: Option<i64>,
}

/// `GET /api/tmux/info/{session}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoResponse {
    pub success: bool,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub peer_window_count: Option<u32>,
}
