//! Fixed 15-byte frame header.
//!
//! ```text
//! ┌───────┬─────────┬──────────┬──────────┬───────────┬───────────┬──────────┬──────────┐
//! │ Magic │ Version │ Msg type │ Req type │ Compress  │ Stream ID │ Length   │ Reserved │
//! │ 1 byte│ 1 byte  │ 1 byte   │ 1 byte   │ 1 byte    │ 2 bytes   │ 4 bytes  │ 4 bytes  │
//! │ 0x11  │         │          │          │           │ uint16 BE │ uint32 BE│ always 0 │
//! └───────┴─────────┴──────────┴──────────┴───────────┴───────────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. `length` counts only the body,
//! not the header. Unknown type bits are tolerated on read; reserved fields
//! are written as zero.

/// Header size in bytes (fixed, exactly 15).
pub const FRAME_HEAD_LEN: usize = 15;

/// Protocol magic; frames with any other first byte are rejected.
pub const MAGIC: u8 = 0x11;

/// Current protocol version.
pub const VERSION: u8 = 0;

/// Message type constants.
pub mod msg_type {
    /// Ordinary request/response message.
    pub const NORMAL: u8 = 0x00;
    /// Heartbeat probe.
    pub const HEARTBEAT: u8 = 0x01;
}

/// Request type constants.
pub mod req_type {
    /// One request, one response.
    pub const UNARY: u8 = 0x00;
    /// Fire-and-forget.
    pub const SEND_ONLY: u8 = 0x01;
    /// Reserved for client streaming.
    pub const CLIENT_STREAM: u8 = 0x02;
    /// Reserved for server streaming.
    pub const SERVER_STREAM: u8 = 0x03;
    /// Reserved for bidirectional streaming.
    pub const BIDI_STREAM: u8 = 0x04;
}

/// Compression constants.
pub mod compress_type {
    /// No compression.
    pub const NONE: u8 = 0x00;
    /// Reserved.
    pub const COMPRESSED: u8 = 0x01;
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u8,
    pub version: u8,
    pub msg_type: u8,
    pub req_type: u8,
    pub compress_type: u8,
    /// Reserved for future multiplexing.
    pub stream_id: u16,
    /// Body length in bytes, excluding this header.
    pub length: u32,
    /// Written as 0, ignored on read.
    pub reserved: u32,
}

impl FrameHeader {
    /// Header for a normal unary frame with the given body length.
    pub fn unary(length: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            msg_type: msg_type::NORMAL,
            req_type: req_type::UNARY,
            compress_type: compress_type::NONE,
            stream_id: 0,
            length,
            reserved: 0,
        }
    }

    /// Encode to the 15-byte wire layout (Big Endian).
    pub fn encode(&self) -> [u8; FRAME_HEAD_LEN] {
        let mut buf = [0u8; FRAME_HEAD_LEN];
        buf[0] = self.magic;
        buf[1] = self.version;
        buf[2] = self.msg_type;
        buf[3] = self.req_type;
        buf[4] = self.compress_type;
        buf[5..7].copy_from_slice(&self.stream_id.to_be_bytes());
        buf[7..11].copy_from_slice(&self.length.to_be_bytes());
        buf[11..15].copy_from_slice(&self.reserved.to_be_bytes());
        buf
    }

    /// Decode from bytes. Returns `None` if the buffer is too short.
    /// Field values are taken as-is; magic and length checks are the
    /// framer's job.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEAD_LEN {
            return None;
        }
        Some(Self {
            magic: buf[0],
            version: buf[1],
            msg_type: buf[2],
            req_type: buf[3],
            compress_type: buf[4],
            stream_id: u16::from_be_bytes([buf[5], buf[6]]),
            length: u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]),
            reserved: u32::from_be_bytes([buf[11], buf[12], buf[13], buf[14]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = FrameHeader::unary(1234);
        let decoded = FrameHeader::decode(&header.encode()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_header_big_endian_layout() {
        let header = FrameHeader {
            magic: MAGIC,
            version: VERSION,
            msg_type: msg_type::HEARTBEAT,
            req_type: req_type::SEND_ONLY,
            compress_type: compress_type::NONE,
            stream_id: 0x0102,
            length: 0x03040506,
            reserved: 0,
        };
        let bytes = header.encode();

        assert_eq!(bytes[0], 0x11);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(bytes[2], 0x01);
        assert_eq!(bytes[3], 0x01);
        assert_eq!(bytes[4], 0x00);
        // stream_id BE
        assert_eq!(&bytes[5..7], &[0x01, 0x02]);
        // length BE
        assert_eq!(&bytes[7..11], &[0x03, 0x04, 0x05, 0x06]);
        // reserved always zero
        assert_eq!(&bytes[11..15], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_header_size_is_exactly_15() {
        assert_eq!(FRAME_HEAD_LEN, 15);
        assert_eq!(FrameHeader::unary(0).encode().len(), 15);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert!(FrameHeader::decode(&[0u8; 14]).is_none());
    }

    #[test]
    fn test_unknown_type_bits_tolerated() {
        let mut bytes = FrameHeader::unary(0).encode();
        bytes[2] = 0x7f;
        bytes[3] = 0x7f;
        let header = FrameHeader::decode(&bytes).unwrap();
        assert_eq!(header.msg_type, 0x7f);
        assert_eq!(header.req_type, 0x7f);
    }
}
