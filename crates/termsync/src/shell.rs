//! Line commands read by `termsync window`.

use thiserror::Error;

pub const HELP: &str = "\
Commands:
  new <type> [dir]       create a terminal owned by this window
  attach <id>            reattach a detached terminal here
  detach <id>            release a terminal; its session keeps running
  close <id>             kill the session and remove the terminal
  rename <id> <name>     set a fixed name
  autoname <id> on|off   toggle automatic renaming
  focus <id>             make a terminal this window's active one
  list                   show every known terminal
  reload-all             re-initialise every window
  help                   show this help
  quit                   stop this window";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    New {
        terminal_type: String,
        working_dir: Option<String>,
    },
    Attach(String),
    Detach(String),
    Close(String),
    Rename {
        id: String,
        name: String,
    },
    AutoName {
        id: String,
        enabled: bool,
    },
    Focus(String),
    List,
    ReloadAll,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShellParseError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<ShellCommand>, ShellParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb {
        "new" => match args.as_slice() {
            [terminal_type] => ShellCommand::New {
                terminal_type: terminal_type.to_string(),
                working_dir: None,
            },
            [terminal_type, dir] => ShellCommand::New {
                terminal_type: terminal_type.to_string(),
                working_dir: Some(dir.to_string()),
            },
            _ => return Err(ShellParseError::Usage("new <type> [dir]")),
        },
        "attach" => ShellCommand::Attach(single(&args, "attach <id>")?),
        "detach" => ShellCommand::Detach(single(&args, "detach <id>")?),
        "close" => ShellCommand::Close(single(&args, "close <id>")?),
        "focus" => ShellCommand::Focus(single(&args, "focus <id>")?),
        // The name is everything after the id, spaces included.
        "rename" => match rest.split_once(char::is_whitespace) {
            Some((id, name)) if !name.trim().is_empty() => ShellCommand::Rename {
                id: id.to_string(),
                name: name.trim().to_string(),
            },
            _ => return Err(ShellParseError::Usage("rename <id> <name>")),
        },
        "autoname" => match args.as_slice() {
            [id, "on"] => ShellCommand::AutoName {
                id: id.to_string(),
                enabled: true,
            },
            [id, "off"] => ShellCommand::AutoName {
                id: id.to_string(),
                enabled: false,
            },
            _ => return Err(ShellParseError::Usage("autoname <id> on|off")),
        },
        "list" | "ls" => ShellCommand::List,
        "reload-all" => ShellCommand::ReloadAll,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(ShellParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn single(args: &[&str], usage: &'static str) -> Result<String, ShellParseError> {
    match args {
        [id] => Ok(id.to_string()),
        _ => Err(ShellParseError::Usage(usage)),
    }
}
