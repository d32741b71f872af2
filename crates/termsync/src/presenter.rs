use serde_json::{Value, json};

use termsync_common::Colors;
use termsync_core::{Snapshot, Terminal, TerminalStatus, WindowId};
use termsync_daemon::LifecycleError;
use termsync_ipc::{SnapshotDto, TerminalDto};

use crate::commands::OutputFormat;
use crate::error::CliError;
use crate::shell::ShellParseError;

/// Everything the CLI shows about a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorView {
    pub message: String,
    pub code: i32,
    pub category: &'static str,
    pub context: Value,
    pub suggestion: Option<String>,
    pub retryable: bool,
}

impl ErrorView {
    pub fn to_json(&self) -> Value {
        let mut output = json!({
            "success": false,
            "error": {
                "message": self.message,
                "code": self.code,
                "category": self.category,
                "retryable": self.retryable,
                "context": self.context,
            }
        });
        if let Some(suggestion) = &self.suggestion {
            output["error"]["suggestion"] = json!(suggestion);
        }
        output
    }
}

impl From<&LifecycleError> for ErrorView {
    fn from(error: &LifecycleError) -> Self {
        Self {
            message: error.to_string(),
            code: error.code(),
            category: error.category().as_str(),
            context: error.context(),
            suggestion: Some(error.suggestion()),
            retryable: error.is_retryable(),
        }
    }
}

impl From<&CliError> for ErrorView {
    fn from(error: &CliError) -> Self {
        Self {
            message: error.to_string(),
            code: error.code(),
            category: error.category().as_str(),
            context: error.context(),
            suggestion: Some(error.suggestion()),
            retryable: error.is_retryable(),
        }
    }
}

impl From<&ShellParseError> for ErrorView {
    fn from(error: &ShellParseError) -> Self {
        Self {
            message: error.to_string(),
            code: termsync_common::error_codes::INVALID_INPUT,
            category: "invalid_input",
            context: Value::Null,
            suggestion: None,
            retryable: false,
        }
    }
}

/// Output for the CLI, as text or JSON lines.
pub trait Presenter {
    fn present_success(&self, message: &str);

    fn present_info(&self, message: &str);

    fn present_raw(&self, text: &str);

    fn present_terminal(&self, label: &str, terminal: &Terminal);

    /// Every terminal known to `window`, marking its active terminal.
    fn present_snapshot(&self, snapshot: &Snapshot, window: &WindowId);

    fn present_error(&self, error: &ErrorView);
}

/// One line describing a terminal.
pub fn terminal_line(terminal: &Terminal, active: bool) -> String {
    let marker = if active { "*" } else { " " };
    let owner = terminal
        .window_id
        .as_ref()
        .map(|w| Colors::window_id(w.as_str()))
        .unwrap_or_else(|| Colors::dim("-"));
    let status = match terminal.status {
        TerminalStatus::Active => Colors::success(terminal.status.as_str()),
        TerminalStatus::Spawning => Colors::info(terminal.status.as_str()),
        TerminalStatus::Detached => Colors::warning(terminal.status.as_str()),
        TerminalStatus::Closed => Colors::dim(terminal.status.as_str()),
    };
    let mut line = format!(
        "{} {}  {}  {}  [{}]",
        marker,
        Colors::terminal_id(terminal.id.as_str()),
        status,
        terminal.name,
        owner
    );
    if let Some(session) = &terminal.session_name {
        line.push_str(&format!("  {}", Colors::dim(session)));
    }
    if let Some(activity) = &terminal.activity {
        match &activity.current_activity {
            Some(current) => line.push_str(&format!("  ({}: {})", activity.state, current)),
            None => line.push_str(&format!("  ({})", activity.state)),
        }
    }
    line
}

pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn present_success(&self, message: &str) {
        println!("{} {}", Colors::success("✓"), message);
    }

    fn present_info(&self, message: &str) {
        println!("{}", Colors::dim(message));
    }

    fn present_raw(&self, text: &str) {
        println!("{}", text);
    }

    fn present_terminal(&self, label: &str, terminal: &Terminal) {
        println!("{} {}", Colors::success(label), terminal_line(terminal, false));
    }

    fn present_snapshot(&self, snapshot: &Snapshot, window: &WindowId) {
        println!(
            "{} {}",
            Colors::bold("Terminals seen by"),
            Colors::window_id(window.as_str())
        );
        if snapshot.is_empty() {
            println!("{}", Colors::dim("  (none)"));
            return;
        }
        for terminal in &snapshot.terminals {
            let active = snapshot.active_terminal_id.as_ref() == Some(&terminal.id);
            println!("{}", terminal_line(terminal, active));
        }
    }

    fn present_error(&self, error: &ErrorView) {
        eprintln!("{} {}", Colors::error("Error:"), error.message);
        if let Some(suggestion) = &error.suggestion {
            eprintln!("{} {}", Colors::dim("Suggestion:"), suggestion);
        }
        if error.retryable {
            eprintln!(
                "{}",
                Colors::dim("(This error may be transient - retry may succeed)")
            );
        }
    }
}

/// One compact JSON object per line, so a driving process can read stdout
/// line by line.
pub struct JsonPresenter;

impl JsonPresenter {
    fn emit(value: &Value) {
        println!("{}", serde_json::to_string(value).unwrap_or_default());
    }
}

pub fn terminal_json(label: &str, terminal: &Terminal) -> Value {
    json!({
        "success": true,
        "event": label,
        "terminal": TerminalDto::from(terminal),
    })
}

pub fn snapshot_json(snapshot: &Snapshot, window: &WindowId) -> Value {
    json!({
        "success": true,
        "windowId": window.as_str(),
        "state": SnapshotDto::from(snapshot),
    })
}

impl Presenter for JsonPresenter {
    fn present_success(&self, message: &str) {
        Self::emit(&json!({ "success": true, "message": message }));
    }

    fn present_info(&self, message: &str) {
        Self::emit(&json!({ "info": message }));
    }

    fn present_raw(&self, text: &str) {
        Self::emit(&json!({ "output": text }));
    }

    fn present_terminal(&self, label: &str, terminal: &Terminal) {
        Self::emit(&terminal_json(label, terminal));
    }

    fn present_snapshot(&self, snapshot: &Snapshot, window: &WindowId) {
        Self::emit(&snapshot_json(snapshot, window));
    }

    fn present_error(&self, error: &ErrorView) {
        eprintln!("{}", serde_json::to_string(&error.to_json()).unwrap_or_default());
    }
}

pub fn create_presenter(format: &OutputFormat) -> Box<dyn Presenter> {
    match format {
        OutputFormat::Json => Box::new(JsonPresenter),
        OutputFormat::Text => Box::new(TextPresenter),
    }
}
