//! Length-delimited frame extraction from a byte stream.
//!
//! A [`Framer`] is stateful and per-connection: it keeps a growable scratch
//! buffer so steady-state traffic does not allocate per frame. It validates
//! the magic byte and the declared length before reading the body, so the
//! frame codec's decode step can be a plain header peel.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::frame::{FRAME_HEAD_LEN, MAGIC};
use crate::error::{Error, Result};

/// Initial scratch buffer size.
pub const DEFAULT_PAYLOAD_LENGTH: usize = 1024;

/// Hard cap on the declared body length.
pub const MAX_PAYLOAD_LENGTH: u32 = 4 * 1024 * 1024;

/// Upper bound on buffer doublings while satisfying a single frame.
const MAX_RESIZES: u32 = 12;

/// Per-connection frame reader.
pub struct Framer {
    buffer: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self { buffer: vec![0u8; DEFAULT_PAYLOAD_LENGTH] }
    }

    /// Read exactly one frame and return it as `header ‖ body`.
    ///
    /// Fails with a framework error on a bad magic byte or a body length
    /// over [`MAX_PAYLOAD_LENGTH`]; in both cases no body bytes are
    /// consumed. EOF before a complete header propagates as an I/O error.
    pub async fn read_frame<R>(&mut self, conn: &mut R) -> Result<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = [0u8; FRAME_HEAD_LEN];
        conn.read_exact(&mut head).await?;

        if head[0] != MAGIC {
            return Err(Error::client_msg("invalid magic"));
        }

        let length = u32::from_be_bytes([head[7], head[8], head[9], head[10]]);
        if length > MAX_PAYLOAD_LENGTH {
            return Err(Error::client_msg("payload too large"));
        }

        // The doubling budget is per frame; the length cap above is the
        // real guard against adversarial growth.
        let mut resizes = 0u32;
        while (self.buffer.len() as u32) < length {
            if resizes >= MAX_RESIZES {
                return Err(Error::client_msg("payload too large"));
            }
            self.buffer.resize(self.buffer.len() * 2, 0);
            resizes += 1;
        }

        let body = &mut self.buffer[..length as usize];
        conn.read_exact(body).await?;

        let mut frame = BytesMut::with_capacity(FRAME_HEAD_LEN + length as usize);
        frame.extend_from_slice(&head);
        frame.extend_from_slice(body);
        Ok(frame.freeze())
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::frame::FrameHeader;
    use tokio::io::AsyncWriteExt;

    fn frame_bytes(body: &[u8]) -> Vec<u8> {
        let mut out = FrameHeader::unary(body.len() as u32).encode().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[tokio::test]
    async fn test_read_single_frame() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        tx.write_all(&frame_bytes(b"hello")).await.unwrap();

        let mut framer = Framer::new();
        let frame = framer.read_frame(&mut rx).await.unwrap();
        assert_eq!(&frame[..FRAME_HEAD_LEN], &FrameHeader::unary(5).encode());
        assert_eq!(&frame[FRAME_HEAD_LEN..], b"hello");
    }

    #[tokio::test]
    async fn test_back_to_back_frames_preserve_order() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        for body in [&b"first"[..], b"second", b"third", b""] {
            tx.write_all(&frame_bytes(body)).await.unwrap();
        }

        let mut framer = Framer::new();
        for body in [&b"first"[..], b"second", b"third", b""] {
            let frame = framer.read_frame(&mut rx).await.unwrap();
            assert_eq!(&frame[FRAME_HEAD_LEN..], body);
        }
    }

    #[tokio::test]
    async fn test_invalid_magic_rejected() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let mut bytes = frame_bytes(b"data");
        bytes[0] = 0x22;
        tx.write_all(&bytes).await.unwrap();

        let mut framer = Framer::new();
        let err = framer.read_frame(&mut rx).await.unwrap_err();
        assert!(err.to_string().contains("invalid magic"));
    }

    #[tokio::test]
    async fn test_length_cap_rejected_before_body_read() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        // Header declares 8 MiB but carries no body at all; the framer must
        // fail from the header alone.
        let mut head = FrameHeader::unary(8 * 1024 * 1024).encode();
        head[7..11].copy_from_slice(&(8u32 * 1024 * 1024).to_be_bytes());
        tx.write_all(&head).await.unwrap();

        let mut framer = Framer::new();
        let err = framer.read_frame(&mut rx).await.unwrap_err();
        assert!(err.to_string().contains("payload too large"));
    }

    #[tokio::test]
    async fn test_buffer_grows_for_large_frame_then_reads_small() {
        let (mut tx, mut rx) = tokio::io::duplex(1024 * 1024);
        let big = vec![0xAB; 300 * 1024];
        tokio::spawn(async move {
            tx.write_all(&frame_bytes(&big)).await.unwrap();
            tx.write_all(&frame_bytes(b"tiny")).await.unwrap();
        });

        let mut framer = Framer::new();
        let frame = framer.read_frame(&mut rx).await.unwrap();
        assert_eq!(frame.len(), FRAME_HEAD_LEN + 300 * 1024);
        // A later small frame reuses the grown buffer.
        let frame = framer.read_frame(&mut rx).await.unwrap();
        assert_eq!(&frame[FRAME_HEAD_LEN..], b"tiny");
    }

    #[tokio::test]
    async fn test_eof_propagates() {
        let (tx, mut rx) = tokio::io::duplex(64);
        drop(tx);

        let mut framer = Framer::new();
        let err = framer.read_frame(&mut rx).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
