mod lifecycle;

pub use lifecycle::TerminalLifecycle;
