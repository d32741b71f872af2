use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use termsync_ipc::{IpcError, read_frame, write_frame};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::DaemonError;

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The `termsync hub` relay: every frame received on any connection is
/// written to every connection, the sender included.
pub struct HubServer {
    listener: UnixListener,
    path: PathBuf,
    max_frame_bytes: usize,
    capacity: usize,
}

impl HubServer {
    /// Binds the relay socket, replacing a stale socket file left by a
    /// crashed hub.
    pub async fn bind(
        path: &Path,
        max_frame_bytes: usize,
        capacity: usize,
    ) -> Result<Self, DaemonError> {
        if path.exists() {
            if UnixStream::connect(path).await.is_ok() {
                return Err(DaemonError::AlreadyRunning);
            }
            std::fs::remove_file(path).map_err(|e| DaemonError::SocketBind(e.to_string()))?;
        }

        let listener =
            UnixListener::bind(path).map_err(|e| DaemonError::SocketBind(e.to_string()))?;
        info!(path = %path.display(), "Hub listening");

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            max_frame_bytes,
            capacity: capacity.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Relays until `shutdown` is set. Open connections are aborted on return.
    pub async fn serve(self, shutdown: Arc<AtomicBool>) -> Result<(), DaemonError> {
        let (fanout, _) = broadcast::channel::<Bytes>(self.capacity);
        let mut connections = JoinSet::new();
        let mut ticker = tokio::time::interval(SHUTDOWN_POLL_INTERVAL);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        debug!(connections = connections.len() + 1, "Window connected");
                        connections.spawn(relay_connection(
                            stream,
                            fanout.clone(),
                            self.max_frame_bytes,
                        ));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {
                    debug!(connections = connections.len(), "Window disconnected");
                }
                _ = ticker.tick() => {
                    if shutdown.load(Ordering::SeqCst) {
                        info!("Hub shutting down");
                        break;
                    }
                }
            }
        }

        connections.shutdown().await;
        Ok(())
    }
}

impl Drop for HubServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn relay_connection(stream: UnixStream, fanout: broadcast::Sender<Bytes>, max_frame_bytes: usize) {
    let (read_half, mut write_half) = stream.into_split();
    let mut outgoing = fanout.subscribe();

    let writer = async move {
        loop {
            match outgoing.recv().await {
                Ok(frame) => {
                    if write_frame(&mut write_half, &frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Slow window missed relayed frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    let reader = async move {
        let mut reader = BufReader::new(read_half);
        loop {
            match read_frame(&mut reader, max_frame_bytes).await {
                Ok(Some(frame)) => {
                    let _ = fanout.send(Bytes::from(frame));
                }
                Ok(None) => break,
                Err(IpcError::SizeLimit { max_bytes }) => {
                    warn!(max_bytes, "Dropped oversized frame");
                }
                Err(e) => {
                    debug!(error = %e, "Connection read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }
}
