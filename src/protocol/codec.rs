//! Protocol codec
//!
//! Length-prefixed JSON frames over any async byte stream.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │         Payload             │
//! └──────────┴─────────────────────────────┘
//! ```

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{OptiError, Result};

/// Header size: 4 bytes length
pub const HEADER_SIZE: usize = 4;

/// Maximum payload size (16 MB)
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Frame Encoding/Decoding
// =============================================================================

/// Encode a message into a complete frame
pub fn encode_frame<T: Serialize>(message: &T) -> Result<BytesMut> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(OptiError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame)
}

/// Decode a frame payload (without its header)
pub fn decode_frame<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one message
///
/// Returns `None` when the peer closes the stream between frames. A stream
/// that ends inside the length header is a protocol error.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(OptiError::Protocol(format!(
                "stream closed after {} of {} header bytes",
                filled, HEADER_SIZE
            )));
        }
        filled += n;
    }

    let payload_len = u32::from_be_bytes(header);
    if payload_len > MAX_FRAME_SIZE {
        return Err(OptiError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_FRAME_SIZE
        )));
    }

    let mut payload = BytesMut::zeroed(payload_len as usize);
    reader.read_exact(&mut payload).await?;

    decode_frame(&payload).map(Some)
}

/// Write one message and flush
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
