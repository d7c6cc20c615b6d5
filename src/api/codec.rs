use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::PipelineError;

/// Frames larger than this are treated as a protocol violation.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Writes one newline-terminated JSON frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), PipelineError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. `Ok(None)` means the peer closed the stream cleanly
/// between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, PipelineError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let mut limited = (&mut *reader).take(MAX_FRAME_BYTES as u64 + 1);
    let bytes_read = limited.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }
    if line.len() > MAX_FRAME_BYTES {
        // Discard the rest of the line so the next read starts on a frame boundary.
        if !line.ends_with('\n') {
            skip_line(reader).await?;
        }
        return Err(PipelineError::Protocol(format!(
            "frame exceeds {} bytes",
            MAX_FRAME_BYTES
        )));
    }
    if !line.ends_with('\n') {
        return Err(PipelineError::TransportClosed);
    }

    Ok(Some(serde_json::from_str(line.trim_end())?))
}

async fn skip_line<R>(reader: &mut R) -> Result<(), PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(PipelineError::TransportClosed);
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}
