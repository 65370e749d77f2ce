//! Frame-level codec: header wrap and peel around opaque envelope bytes.
//!
//! A [`Codec`] turns envelope bytes into a wire frame and back. The default
//! implementation emits the fixed 15-byte header of [`frame`] and relies on
//! the [`Framer`] having validated magic and length before decode is ever
//! called, so decode is a plain peel.
//!
//! Codecs are looked up by protocol name in a process-wide registry with
//! the default registered under `"default"`.

pub mod frame;
pub mod framer;

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::registry::Registry;

pub use frame::{FrameHeader, FRAME_HEAD_LEN, MAGIC, VERSION};
pub use framer::{Framer, DEFAULT_PAYLOAD_LENGTH, MAX_PAYLOAD_LENGTH};

/// Frame-level encode/decode.
pub trait Codec: Send + Sync {
    /// Prepend a frame header to the envelope bytes.
    fn encode(&self, body: &[u8]) -> Result<Bytes>;

    /// Strip the frame header, returning the envelope bytes.
    fn decode(&self, frame: Bytes) -> Result<Bytes>;
}

/// The built-in codec emitting the 15-byte header with all type fields
/// zero.
pub struct DefaultCodec;

impl Codec for DefaultCodec {
    fn encode(&self, body: &[u8]) -> Result<Bytes> {
        let header = FrameHeader::unary(body.len() as u32);
        let mut buf = BytesMut::with_capacity(FRAME_HEAD_LEN + body.len());
        buf.put_slice(&header.encode());
        buf.put_slice(body);
        Ok(buf.freeze())
    }

    fn decode(&self, frame: Bytes) -> Result<Bytes> {
        if frame.len() < FRAME_HEAD_LEN {
            return Err(Error::client_msg("frame shorter than header"));
        }
        Ok(frame.slice(FRAME_HEAD_LEN..))
    }
}

static CODECS: Lazy<Registry<dyn Codec>> =
    Lazy::new(|| Registry::new("default", Arc::new(DefaultCodec)));

/// Register a codec under a protocol name, replacing any prior entry.
pub fn register(name: impl Into<String>, codec: Arc<dyn Codec>) {
    CODECS.register(name, codec);
}

/// Look up a codec by protocol name; unknown names get the default.
pub fn get(name: &str) -> Arc<dyn Codec> {
    CODECS.get(name)
}
