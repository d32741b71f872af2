//! Domain types for replicated terminals.
//!
//! IMPORTANT: these types must not depend on framework crates like serde or
//! uuid. Wire encoding lives in `termsync-ipc`, id generation in the daemon.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Sentinel owner used when a terminal carries no explicit window.
pub const MAIN_WINDOW: &str = "main";

/// Error returned when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdError {
    pub message: String,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdError {}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Validating constructor for ids that come from outside the process.
            pub fn try_new(id: impl Into<String>) -> Result<Self, IdError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(IdError {
                        message: format!("{} cannot be empty or whitespace-only", $label),
                    });
                }
                Ok(Self(id))
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Globally unique, immutable terminal identifier.
    TerminalId,
    "Terminal ID"
);

string_id!(
    /// Identifier of one window context (one running process).
    WindowId,
    "Window ID"
);

string_id!(
    /// Opaque transport-side handle for a terminal's backing process.
    AgentId,
    "Agent ID"
);

impl WindowId {
    pub fn main() -> Self {
        Self(MAIN_WINDOW.to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == MAIN_WINDOW
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::main()
    }
}

/// Lifecycle state of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalStatus {
    Spawning,
    Active,
    Detached,
    Closed,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Spawning => "spawning",
            TerminalStatus::Active => "active",
            TerminalStatus::Detached => "detached",
            TerminalStatus::Closed => "closed",
        }
    }

    /// Bound to a window with a (pending or confirmed) backing process.
    pub fn is_live(&self) -> bool {
        matches!(self, TerminalStatus::Spawning | TerminalStatus::Active)
    }

    /// Closed is terminal: nothing leaves it.
    pub fn can_transition_to(&self, next: TerminalStatus) -> bool {
        use TerminalStatus::*;
        matches!(
            (self, next),
            (Spawning, Active)
                | (Spawning, Detached)
                | (Spawning, Closed)
                | (Active, Detached)
                | (Active, Closed)
                | (Detached, Spawning)
                | (Detached, Closed)
        )
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalStatus {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spawning" => Ok(TerminalStatus::Spawning),
            "active" => Ok(TerminalStatus::Active),
            "detached" => Ok(TerminalStatus::Detached),
            "closed" => Ok(TerminalStatus::Closed),
            other => Err(IdError {
                message: format!("unknown terminal status: {other}"),
            }),
        }
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub terminal_id: TerminalId,
    pub from: TerminalStatus,
    pub to: TerminalStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "terminal {} cannot move from {} to {}",
            self.terminal_id, self.from, self.to
        )
    }
}

impl std::error::Error for TransitionError {}

/// Last activity reported by the external status sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub state: String,
    pub current_activity: Option<String>,
    /// Milliseconds since the Unix epoch, as reported by the sidecar.
    pub last_updated: Option<i64>,
}

/// A replicated terminal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub id: TerminalId,
    /// `None` while detached.
    pub window_id: Option<WindowId>,
    pub name: String,
    pub session_name: Option<String>,
    pub status: TerminalStatus,
    pub agent_id: Option<AgentId>,
    pub working_dir: Option<String>,
    pub terminal_type: String,
    pub auto_update_name: bool,
    pub activity: Option<Activity>,
}

impl Terminal {
    /// A freshly created terminal, owned by `owner` and still spawning.
    pub fn spawning(
        id: TerminalId,
        owner: WindowId,
        terminal_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            window_id: Some(owner),
            name: name.into(),
            session_name: None,
            status: TerminalStatus::Spawning,
            agent_id: None,
            working_dir: None,
            terminal_type: terminal_type.into(),
            auto_update_name: true,
            activity: None,
        }
    }

    /// A terminal that exists externally but is bound to no window.
    pub fn detached(
        id: TerminalId,
        terminal_type: impl Into<String>,
        name: impl Into<String>,
        session_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            window_id: None,
            name: name.into(),
            session_name: Some(session_name.into()),
            status: TerminalStatus::Detached,
            agent_id: None,
            working_dir: None,
            terminal_type: terminal_type.into(),
            auto_update_name: true,
            activity: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Owner used for every ownership decision: the window id, or `"main"`.
    pub fn effective_owner(&self) -> &str {
        self.window_id
            .as_ref()
            .map(WindowId::as_str)
            .unwrap_or(MAIN_WINDOW)
    }

    pub fn is_owned_by(&self, window: &WindowId) -> bool {
        self.effective_owner() == window.as_str()
    }

    /// Moves to `next`, enforcing the lifecycle table.
    ///
    /// Detaching clears ownership and the transport handle.
    pub fn transition(&mut self, next: TerminalStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                terminal_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next == TerminalStatus::Detached {
            self.window_id = None;
            self.agent_id = None;
        }
        Ok(())
    }
}
