use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
pub use clap_complete::Shell;

const LONG_ABOUT: &str = r#"termsync keeps a set of tmux-backed terminals consistent across
independent windows. Each window owns the terminals it created; peers see
them, can detach them, and can reattach detached ones.

WORKFLOW:
    1. Start the relay once:        termsync hub
    2. Start one process per window: termsync window --id left
    3. Type commands on the window's stdin (see 'help')

WINDOW COMMANDS:
    new <type> [dir]       Create a terminal owned by this window
    attach <id>            Reattach a detached terminal here
    detach <id>            Release a terminal; its session keeps running
    close <id>             Kill the session and remove the terminal
    rename <id> <name>     Set a fixed name (stops automatic renaming)
    autoname <id> on|off   Toggle automatic renaming
    focus <id>             Make a terminal this window's active one
    list                   Show every known terminal
    reload-all             Re-initialise every window
    quit                   Stop this window

EXAMPLES:
    termsync hub &
    termsync window --id left
    TERMSYNC_WINDOW_ID=right termsync window
    termsync reload-all"#;

#[derive(Parser)]
#[command(name = "termsync")]
#[command(author, version)]
#[command(about = "Cross-window terminal state replication for tmux-backed terminals")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Hub socket path (default: $XDG_RUNTIME_DIR/termsync.sock)
    #[arg(long, global = true, env = "TERMSYNC_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Returns the effective output format, considering --json shorthand.
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the relay that fans broadcasts out to every window
    #[command(long_about = r#"Run the relay that fans broadcasts out to every window.

Listens on the hub socket and writes every line received from any window to
every connected window, the sender included. Stops on SIGINT or SIGTERM and
removes the socket file."#)]
    Hub,

    /// Run a window and read commands from stdin
    #[command(long_about = r#"Run a window and read commands from stdin.

The window connects to the hub (or runs alone if none is reachable), adopts
tmux sessions left without a window, and keeps the names and activity of
its own terminals in sync with the status sidecar.

EXAMPLES:
    termsync window --id left
    termsync window --standalone
    echo "new bash /tmp" | termsync window --id scratch"#)]
    Window {
        /// Window id (default: main)
        #[arg(long, env = "TERMSYNC_WINDOW_ID")]
        id: Option<String>,

        /// Do not connect to the hub
        #[arg(long)]
        standalone: bool,

        /// tmux server socket name (passed as tmux -L)
        #[arg(long, env = "TERMSYNC_TMUX_SOCKET")]
        tmux_socket: Option<String>,
    },

    /// Ask every connected window to re-initialise
    #[command(name = "reload-all")]
    ReloadAll,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
