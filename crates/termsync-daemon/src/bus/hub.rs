use std::path::Path;

use bytes::Bytes;
use termsync_ipc::{IpcError, read_frame, write_frame};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::BroadcastChannel;
use crate::error::BusError;

/// Client side of the `termsync hub` relay.
///
/// Owns one reader and one writer task. Dropping the bus aborts both and
/// closes the socket.
pub struct HubBus {
    outbound: mpsc::Sender<Bytes>,
    inbound: broadcast::Receiver<Bytes>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl HubBus {
    pub async fn connect(
        path: &Path,
        max_frame_bytes: usize,
        capacity: usize,
    ) -> Result<Self, BusError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| BusError::Connect {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let (read_half, mut write_half) = stream.into_split();
        let capacity = capacity.max(1);

        // The reader task holds the only sender; when it exits every
        // subscriber sees `Closed`.
        let (inbound_tx, inbound) = broadcast::channel(capacity);
        let reader = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match read_frame(&mut reader, max_frame_bytes).await {
                    Ok(Some(frame)) => {
                        let _ = inbound_tx.send(Bytes::from(frame));
                    }
                    Ok(None) => {
                        info!("Hub closed the connection");
                        break;
                    }
                    Err(IpcError::SizeLimit { max_bytes }) => {
                        warn!(max_bytes, "Dropped oversized frame from hub");
                    }
                    Err(e) => {
                        warn!(error = %e, "Hub connection failed");
                        break;
                    }
                }
            }
        });

        let (outbound, mut outbound_rx) = mpsc::channel::<Bytes>(capacity);
        let writer = tokio::spawn(async move {
            while let Some(payload) = outbound_rx.recv().await {
                if let Err(e) = write_frame(&mut write_half, &payload).await {
                    warn!(error = %e, "Failed to write to hub");
                    break;
                }
            }
            debug!("Hub writer stopped");
        });

        info!(path = %path.display(), "Connected to hub");
        Ok(Self {
            outbound,
            inbound,
            reader,
            writer,
        })
    }
}

impl BroadcastChannel for HubBus {
    fn publish(&self, payload: Bytes) -> Result<(), BusError> {
        self.outbound.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BusError::Full,
            mpsc::error::TrySendError::Closed(_) => BusError::Closed,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.inbound.resubscribe()
    }
}

impl Drop for HubBus {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl std::fmt::Debug for HubBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubBus")
            .field("reader_finished", &self.reader.is_finished())
            .field("writer_finished", &self.writer.is_finished())
            .finish()
    }
}
