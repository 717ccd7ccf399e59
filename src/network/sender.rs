//! Per-connection send serializer
//!
//! Request tasks finish in any order; each reply frame must still reach the
//! socket whole. The frame is encoded before the lock is taken, so only the
//! socket write itself is serialized.

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::protocol::encode_frame;

pub struct SendSerializer<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> SendSerializer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Write one complete frame
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let frame = encode_frame(message)?;

        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }
}
