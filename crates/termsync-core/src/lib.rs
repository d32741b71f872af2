//! Core replicated model for termsync.
//!
//! This crate holds the per-window terminal registry and the pure ownership
//! merge that folds a peer window's snapshot into local state. It has no
//! runtime, serialization or I/O dependencies; those live in the outer crates.

#![deny(clippy::all)]

pub mod ownership;
pub mod registry;
mod snapshot;
mod terminal;

#[cfg(test)]
pub mod test_fixtures;

pub use ownership::resolve;
pub use registry::ChangeOrigin;
pub use registry::RegistryObserver;
pub use registry::TerminalRegistry;
pub use snapshot::MAX_TOMBSTONES;
pub use snapshot::Snapshot;
pub use terminal::Activity;
pub use terminal::AgentId;
pub use terminal::IdError;
pub use terminal::MAIN_WINDOW;
pub use terminal::Terminal;
pub use terminal::TerminalId;
pub use terminal::TerminalStatus;
pub use terminal::TransitionError;
pub use terminal::WindowId;
