//! Length-prefixed binary frame codec.
//!
//! Layout: `dataSize(u32 LE) | msgId(u32 LE) | data(dataSize bytes)`. The
//! codec is pure — it holds no state of its own, it only reads and writes
//! the header/body pair.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default ceiling on `data`, matching the original protocol's `MaxDataSize`.
pub const DEFAULT_MAX_FRAME_DATA: u32 = 1024 * 1024;

const HEADER_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame data size {size} exceeds configured maximum {max}")]
    FrameTooLarge { size: u32, max: u32 },
    #[error("i/o error reading frame: {0}")]
    Io(#[from] std::io::Error),
}

/// One decoded frame: a verb id and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_id: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(msg_id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            msg_id,
            data: data.into(),
        }
    }

    /// Serialize header + body into a single contiguous buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.data.len());
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.msg_id.to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Write this frame to `writer` as a single logical write.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), CodecError> {
        writer.write_all(&self.encode()).await?;
        Ok(())
    }
}

/// Read exactly one frame from `reader`, rejecting data sections larger than `max_data`.
///
/// A short read at either the header or the body is reported as `CodecError::Io`
/// (`UnexpectedEof`), which the caller should treat as fatal for the session.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_data: u32,
) -> Result<Frame, CodecError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let data_size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let msg_id = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if data_size > max_data {
        return Err(CodecError::FrameTooLarge {
            size: data_size,
            max: max_data,
        });
    }
    let mut data = vec![0u8; data_size as usize];
    reader.read_exact(&mut data).await?;
    Ok(Frame { msg_id, data })
}
