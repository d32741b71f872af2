use serde::{Deserialize, Serialize};
use termsync_core::{
    Activity, AgentId, Snapshot, Terminal, TerminalId, TerminalStatus, WindowId,
};

use crate::IpcError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDto {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalDto {
    pub id: String,
    #[serde(default)]
    pub window_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub session_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(rename = "type")]
    pub terminal_type: String,
    #[serde(default = "default_auto_update_name")]
    pub auto_update_name: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityDto>,
}

fn default_auto_update_name() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    #[serde(default)]
    pub terminals: Vec<TerminalDto>,
    #[serde(default)]
    pub active_terminal_id: Option<String>,
    #[serde(default)]
    pub focused_terminal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub closed: Vec<String>,
}

impl From<&Activity> for ActivityDto {
    fn from(a: &Activity) -> Self {
        Self {
            status: a.state.clone(),
            current_activity: a.current_activity.clone(),
            last_updated: a.last_updated,
        }
    }
}

impl From<ActivityDto> for Activity {
    fn from(dto: ActivityDto) -> Self {
        Self {
            state: dto.status,
            current_activity: dto.current_activity,
            last_updated: dto.last_updated,
        }
    }
}

impl From<&Terminal> for TerminalDto {
    fn from(t: &Terminal) -> Self {
        Self {
            id: t.id.to_string(),
            window_id: t.window_id.as_ref().map(|w| w.to_string()),
            name: t.name.clone(),
            session_name: t.session_name.clone(),
            status: t.status.as_str().to_string(),
            agent_id: t.agent_id.as_ref().map(|a| a.to_string()),
            working_dir: t.working_dir.clone(),
            terminal_type: t.terminal_type.clone(),
            auto_update_name: t.auto_update_name,
            activity: t.activity.as_ref().map(ActivityDto::from),
        }
    }
}

impl TryFrom<TerminalDto> for Terminal {
    type Error = IpcError;

    fn try_from(dto: TerminalDto) -> Result<Self, Self::Error> {
        let id = TerminalId::try_new(dto.id)
            .map_err(|e| IpcError::InvalidSnapshot(e.to_string()))?;
        let status: TerminalStatus = dto
            .status
            .parse()
            .map_err(|e: termsync_core::IdError| IpcError::InvalidSnapshot(e.to_string()))?;
        // Blank ids from older peers mean "absent".
        let window_id = dto
            .window_id
            .filter(|w| !w.trim().is_empty())
            .map(WindowId::new);
        let agent_id = dto
            .agent_id
            .filter(|a| !a.trim().is_empty())
            .map(AgentId::new);

        Ok(Self {
            id,
            window_id,
            name: dto.name,
            session_name: dto.session_name,
            status,
            agent_id,
            working_dir: dto.working_dir,
            terminal_type: dto.terminal_type,
            auto_update_name: dto.auto_update_name,
            activity: dto.activity.map(Activity::from),
        })
    }
}

impl From<&Snapshot> for SnapshotDto {
    fn from(s: &Snapshot) -> Self {
        Self {
            terminals: s.terminals.iter().map(TerminalDto::from).collect(),
            active_terminal_id: s.active_terminal_id.as_ref().map(|id| id.to_string()),
            focused_terminal_id: s.focused_terminal_id.as_ref().map(|id| id.to_string()),
            closed: s.closed.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl TryFrom<SnapshotDto> for Snapshot {
    type Error = IpcError;

    /// Rejects the whole snapshot if any terminal is malformed or appears
    /// twice. Pointers to unknown terminals are dropped.
    fn try_from(dto: SnapshotDto) -> Result<Self, Self::Error> {
        let mut terminals: Vec<Terminal> = Vec::with_capacity(dto.terminals.len());
        for terminal_dto in dto.terminals {
            let terminal = Terminal::try_from(terminal_dto)?;
            if terminals.iter().any(|t| t.id == terminal.id) {
                return Err(IpcError::InvalidSnapshot(format!(
                    "duplicate terminal id {}",
                    terminal.id
                )));
            }
            terminals.push(terminal);
        }

        let pointer = |raw: Option<String>| {
            raw.filter(|id| terminals.iter().any(|t| t.id.as_str() == id))
                .map(TerminalId::new)
        };
        let active_terminal_id = pointer(dto.active_terminal_id);
        let focused_terminal_id = pointer(dto.focused_terminal_id);

        let mut snapshot = Snapshot {
            terminals,
            active_terminal_id,
            focused_terminal_id,
            closed: Vec::new(),
        };
        for id in dto.closed {
            if let Ok(id) = TerminalId::try_new(id) {
                snapshot.tombstone(id);
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut active = Terminal::spawning("t1".into(), "w1".into(), "claude", "Claude");
        active.status = TerminalStatus::Active;
        active.agent_id = Some("ctt-t1".into());
        active.session_name = Some("ctt-t1".into());
        active.activity = Some(Activity {
            state: "working".into(),
            current_activity: Some("Editing".into()),
            last_updated: Some(1_700_000_000_000),
        });
        let detached = Terminal::detached("t2".into(), "bash", "bash", "ctt-t2");

        let mut snapshot = Snapshot {
            terminals: vec![active, detached],
            active_terminal_id: Some("t1".into()),
            focused_terminal_id: Some("t2".into()),
            closed: Vec::new(),
        };
        snapshot.tombstone("t0".into());
        snapshot
    }

    #[test]
    fn test_snapshot_survives_the_wire() {
        let snapshot = sample();
        let json = serde_json::to_string(&SnapshotDto::from(&snapshot)).unwrap();
        let dto: SnapshotDto = serde_json::from_str(&json).unwrap();
        assert_eq!(Snapshot::try_from(dto).unwrap(), snapshot);
    }

    #[test]
    fn test_field_names_are_camel_case() {
        let value = serde_json::to_value(SnapshotDto::from(&sample())).unwrap();
        assert_eq!(value["activeTerminalId"], "t1");
        assert_eq!(value["terminals"][0]["windowId"], "w1");
        assert_eq!(value["terminals"][0]["type"], "claude");
        assert_eq!(value["terminals"][0]["autoUpdateName"], true);
        assert_eq!(value["terminals"][0]["activity"]["currentActivity"], "Editing");
        assert_eq!(value["terminals"][1]["status"], "detached");
        assert!(value["terminals"][1]["windowId"].is_null());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"terminals":[{"id":"t1","name":"n","status":"active","type":"bash"}]}"#;
        let dto: SnapshotDto = serde_json::from_str(json).unwrap();
        let snapshot = Snapshot::try_from(dto).unwrap();
        let t = snapshot.terminal("t1").unwrap();
        assert!(t.window_id.is_none());
        assert!(t.auto_update_name);
        assert!(snapshot.active_terminal_id.is_none());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let json = r#"{"terminals":[{"id":"t1","name":"n","status":"zombie","type":"bash"}]}"#;
        let dto: SnapshotDto = serde_json::from_str(json).unwrap();
        assert!(matches!(
            Snapshot::try_from(dto),
            Err(IpcError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let t = TerminalDto::from(&Terminal::detached("t1".into(), "bash", "a", "ctt-t1"));
        let dto = SnapshotDto {
            terminals: vec![t.clone(), t],
            ..Default::default()
        };
        assert!(Snapshot::try_from(dto).is_err());
    }

    #[test]
    fn test_dangling_pointers_dropped() {
        let dto = SnapshotDto {
            terminals: Vec::new(),
            active_terminal_id: Some("ghost".into()),
            focused_terminal_id: Some("ghost".into()),
            closed: Vec::new(),
        };
        let snapshot = Snapshot::try_from(dto).unwrap();
        assert!(snapshot.active_terminal_id.is_none());
        assert!(snapshot.focused_terminal_id.is_none());
    }

    #[test]
    fn test_blank_window_id_means_unowned() {
        let json = r#"{"terminals":[{"id":"t1","windowId":"","name":"n","status":"detached","type":"bash"}]}"#;
        let dto: SnapshotDto = serde_json::from_str(json).unwrap();
        let snapshot = Snapshot::try_from(dto).unwrap();
        assert!(snapshot.terminal("t1").unwrap().window_id.is_none());
    }
}
