use std::time::Duration;

use clap::CommandFactory;
use clap::Parser;
use clap_complete::generate;
use termsync_common::color_init;
use termsync_daemon::WindowConfig;
use tracing::debug;

use crate::commands::{Cli, Commands};
use crate::error::CliError;
use crate::handlers::{self, WindowOptions};
use crate::presenter::{ErrorView, Presenter, create_presenter};
use crate::telemetry;

const PROGRAM_NAME: &str = "termsync";
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

pub struct Application;

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self
    }

    /// Runs the parsed command and returns the process exit code.
    pub fn run(&self) -> i32 {
        let cli = Cli::parse();
        let _telemetry = telemetry::init_tracing(if cli.verbose { "debug" } else { "warn" });
        color_init(cli.no_color);
        let format = cli.effective_format();
        debug!(command = ?cli.command, format = ?format, "CLI command parsed");

        let presenter = create_presenter(&format);
        match self.execute(cli, presenter.as_ref()) {
            Ok(()) => 0,
            Err(e) => {
                presenter.present_error(&ErrorView::from(&e));
                e.exit_code()
            }
        }
    }

    fn execute(&self, cli: Cli, presenter: &dyn Presenter) -> Result<(), CliError> {
        let (window_id, options) = match &cli.command {
            Commands::Completions { shell } => {
                let mut cmd = Cli::command();
                generate(*shell, &mut cmd, PROGRAM_NAME, &mut std::io::stdout());
                return Ok(());
            }
            Commands::Window {
                id,
                standalone,
                tmux_socket,
            } => (
                id.clone(),
                WindowOptions {
                    standalone: *standalone,
                    tmux_socket: tmux_socket.clone(),
                },
            ),
            Commands::Hub | Commands::ReloadAll => (None, WindowOptions::default()),
        };
        let config = handlers::resolve_config(WindowConfig::from_env(), cli.socket, window_id)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("termsync-worker")
            .build()?;

        let result = runtime.block_on(async {
            match cli.command {
                Commands::Hub => handlers::run_hub(&config, presenter).await,
                Commands::Window { .. } => handlers::run_window(config, options, presenter).await,
                Commands::ReloadAll => handlers::reload_all(&config, presenter).await,
                Commands::Completions { .. } => Ok(()),
            }
        });
        // A stdin read left pending by a signal would otherwise block the drop.
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        result
    }
}
