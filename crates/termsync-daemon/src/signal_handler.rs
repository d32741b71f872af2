use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

use crate::error::DaemonError;

/// Raises a shared flag on SIGINT, SIGTERM or SIGHUP.
///
/// The hub relay and window loops poll the flag; nothing is torn down from
/// the signal thread itself.
pub struct SignalHandler {
    shutdown: Arc<AtomicBool>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl SignalHandler {
    pub fn setup(shutdown: Arc<AtomicBool>) -> Result<Self, DaemonError> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])
            .map_err(|e| DaemonError::SignalSetup(e.to_string()))?;

        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("termsync-signals".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    info!(signal = sig, "Received signal, shutting down");
                    flag.store(true, Ordering::SeqCst);
                }
            })
            .map_err(|e| {
                DaemonError::SignalSetup(format!("failed to spawn signal thread: {}", e))
            })?;

        Ok(Self { shutdown, handle })
    }

    pub fn triggered(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is raised, checking every `poll`.
    pub async fn wait(&self, poll: Duration) {
        let mut ticker = tokio::time::interval(poll);
        while !self.triggered() {
            ticker.tick().await;
        }
    }
}
