//! Frame header encoding and async frame I/O.

use clove_core::AgentId;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame magic, "AGNT" interpreted as a little-endian u32.
pub const MAGIC: u32 = 0x4147_4E54;

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 17;

/// Maximum accepted payload length (1 MiB).
pub const MAX_PAYLOAD: u64 = 1024 * 1024;

/// Errors produced by frame I/O.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The header carried a magic other than [`MAGIC`].
    #[error("invalid frame magic 0x{0:08x}")]
    InvalidMagic(u32),

    /// The declared payload length exceeds [`MAX_PAYLOAD`].
    ///
    /// The header has already been consumed, so the agent id and opcode are
    /// available for an error reply before the connection is closed.
    #[error("frame too large: {declared} bytes")]
    TooLarge {
        /// Agent id from the rejected header.
        agent_id: AgentId,
        /// Opcode from the rejected header.
        opcode: u8,
        /// Declared payload length.
        declared: u64,
    },

    /// Underlying I/O failure (including short reads mid-frame).
    #[error("frame i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// One wire frame: header fields plus raw payload bytes.
///
/// The opcode is kept raw so unknown opcodes survive framing and can be
/// rejected at dispatch with the session intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Agent id from the header.
    pub agent_id: AgentId,
    /// Raw opcode byte.
    pub opcode: u8,
    /// Payload bytes (`payload_length` of them).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame from parts.
    #[must_use]
    pub fn new(agent_id: AgentId, opcode: u8, payload: Vec<u8>) -> Self {
        Self {
            agent_id,
            opcode,
            payload,
        }
    }

    /// Encode header + payload into a single buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN.saturating_add(self.payload.len()));
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.agent_id.0.to_le_bytes());
        buf.push(self.opcode);
        buf.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Payload interpreted as UTF-8, lossily.
    #[must_use]
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Read exactly one frame from `reader`.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary (the peer closed
/// between requests). A short read inside a frame is an I/O error.
///
/// # Errors
///
/// Returns [`FrameError::InvalidMagic`] or [`FrameError::TooLarge`] for
/// protocol violations, [`FrameError::Io`] for transport failures.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];

    // Distinguish clean EOF (no bytes at all) from a torn header.
    match reader.read(&mut header).await? {
        0 => return Ok(None),
        n if n < HEADER_LEN => reader.read_exact(&mut header[n..]).await.map(|_| ())?,
        _ => {},
    }

    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if magic != MAGIC {
        return Err(FrameError::InvalidMagic(magic));
    }

    let agent_id = AgentId(u32::from_le_bytes([
        header[4], header[5], header[6], header[7],
    ]));
    let opcode = header[8];
    let declared = u64::from_le_bytes([
        header[9], header[10], header[11], header[12], header[13], header[14], header[15],
        header[16],
    ]);

    if declared > MAX_PAYLOAD {
        return Err(FrameError::TooLarge {
            agent_id,
            opcode,
            declared,
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut payload = vec![0u8; declared as usize];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame {
        agent_id,
        opcode,
        payload,
    }))
}

/// Write one frame to `writer` and flush it.
///
/// # Errors
///
/// Returns [`FrameError::Io`] on transport failure.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let frame = Frame::new(AgentId(7), 0x20, b"{\"to\":1}".to_vec());
        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let back = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(back, frame);
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_magic() {
        let mut raw = Frame::new(AgentId(1), 0, Vec::new()).encode();
        raw[0] = 0xde;
        let mut cursor = std::io::Cursor::new(raw);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(FrameError::InvalidMagic(_))
        ));
    }

    #[tokio::test]
    async fn test_payload_at_cap_accepted() {
        #[allow(clippy::cast_possible_truncation)]
        let frame = Frame::new(AgentId(1), 0, vec![0xaa; MAX_PAYLOAD as usize]);
        let mut cursor = std::io::Cursor::new(frame.encode());
        let back = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(back.payload.len() as u64, MAX_PAYLOAD);
    }

    #[tokio::test]
    async fn test_payload_over_cap_rejected() {
        // Hand-build a header declaring MAX_PAYLOAD + 1 without materializing it.
        let mut raw = Vec::new();
        raw.extend_from_slice(&MAGIC.to_le_bytes());
        raw.extend_from_slice(&3u32.to_le_bytes());
        raw.push(0x04);
        raw.extend_from_slice(&(MAX_PAYLOAD + 1).to_le_bytes());
        let mut cursor = std::io::Cursor::new(raw);
        match read_frame(&mut cursor).await {
            Err(FrameError::TooLarge {
                agent_id,
                opcode,
                declared,
            }) => {
                assert_eq!(agent_id, AgentId(3));
                assert_eq!(opcode, 0x04);
                assert_eq!(declared, MAX_PAYLOAD + 1);
            },
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_torn_header_is_io_error() {
        let raw = Frame::new(AgentId(1), 0, Vec::new()).encode();
        let mut cursor = std::io::Cursor::new(raw[..10].to_vec());
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(FrameError::Io(_))
        ));
    }
}
