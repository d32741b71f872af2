//! Per-window runtime for termsync.
//!
//! A window owns a [`TerminalRegistry`](termsync_core::TerminalRegistry) inside
//! a single task ([`WindowRuntime`]), replicates every local change over a
//! [`BroadcastChannel`], folds peer snapshots in through the ownership merge,
//! and periodically reconciles its own terminals against external sources.

#![deny(clippy::all)]

pub mod bus;
mod config;
mod error;
mod reconciler;
mod replicator;
#[cfg(unix)]
mod signal_handler;
pub mod sources;
pub mod transport;
mod usecases;
mod window;

#[cfg(test)]
mod test_support;

pub use bus::BroadcastChannel;
pub use bus::HubBus;
pub use bus::HubServer;
pub use bus::LocalBus;
pub use config::WindowConfig;
pub use error::BusError;
pub use error::DaemonError;
pub use error::LifecycleError;
pub use error::QueryError;
pub use error::TransportError;
pub use reconciler::Reconciler;
pub use reconciler::ReconcilerState;
pub use reconciler::TickOutcome;
pub use reconciler::TickReport;
pub use replicator::ReceiveOutcome;
pub use replicator::Replicator;
pub use replicator::now_millis;
#[cfg(unix)]
pub use signal_handler::SignalHandler;
pub use sources::HttpSidecar;
pub use sources::SessionMetadataSource;
pub use sources::StatusSource;
pub use transport::SessionListing;
pub use transport::SpawnRequest;
pub use transport::TerminalTransport;
pub use transport::TmuxTransport;
pub use transport::TransportNotice;
pub use usecases::TerminalLifecycle;
pub use window::ORPHAN_TERMINAL_TYPE;
pub use window::WindowHandle;
pub use window::WindowRuntime;
pub use window::adopt_orphans;
