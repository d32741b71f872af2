use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

static DISABLED: AtomicBool = AtomicBool::new(false);

/// Disables color when asked to, when `NO_COLOR` is set, or when stdout is
/// not a terminal.
pub fn init(no_color: bool) {
    let disabled =
        no_color || std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal();
    DISABLED.store(disabled, Ordering::Relaxed);
}

fn is_disabled() -> bool {
    DISABLED.load(Ordering::Relaxed)
}

fn paint(code: &str, text: &str) -> String {
    if is_disabled() {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// ANSI styling helpers for CLI output.
pub struct Colors;

impl Colors {
    pub fn success(text: &str) -> String {
        paint("32", text)
    }

    pub fn error(text: &str) -> String {
        paint("31", text)
    }

    pub fn warning(text: &str) -> String {
        paint("33", text)
    }

    pub fn info(text: &str) -> String {
        paint("36", text)
    }

    pub fn dim(text: &str) -> String {
        paint("2", text)
    }

    pub fn bold(text: &str) -> String {
        paint("1", text)
    }

    pub fn terminal_id(text: &str) -> String {
        paint("1;36", text)
    }

    pub fn window_id(text: &str) -> String {
        paint("35", text)
    }
}
