//! Newline-delimited frames on the hub socket.
//!
//! Each frame is one JSON document followed by `\n`. The limit applies per
//! frame, since connections are long-lived.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::IpcError;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Reads one frame. `Ok(None)` means the peer closed the stream cleanly.
///
/// A frame longer than `max_bytes` is discarded up to its newline and
/// reported as [`IpcError::SizeLimit`]; the next call reads the next frame.
pub async fn read_frame<R>(reader: &mut R, max_bytes: usize) -> Result<Option<Vec<u8>>, IpcError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let limit = max_bytes as u64 + 1;
    let n = (&mut *reader)
        .take(limit)
        .read_until(b'\n', &mut frame)
        .await?;
    if n == 0 {
        return Ok(None);
    }

    if frame.last() == Some(&b'\n') {
        frame.pop();
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }
    } else if n as u64 >= limit {
        discard_line(reader).await?;
        return Err(IpcError::SizeLimit { max_bytes });
    }

    if frame.len() > max_bytes {
        return Err(IpcError::SizeLimit { max_bytes });
    }
    Ok(Some(frame))
}

async fn discard_line<R>(reader: &mut R) -> Result<(), IpcError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        let len = buf.len();
        match buf.iter().position(|b| *b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                return Ok(());
            }
            None => reader.consume(len),
        }
    }
}

/// Writes `payload` plus the trailing newline and flushes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
