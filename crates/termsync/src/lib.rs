#![deny(clippy::all)]

pub mod app;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod presenter;
pub mod shell;
pub mod telemetry;

pub use app::Application;

pub use commands::Cli;
pub use commands::OutputFormat;
pub use error::CliError;
pub use handlers::HandlerResult;
pub use presenter::Presenter;
pub use shell::ShellCommand;
