//! Request/response envelope.
//!
//! The body of a normal frame is a protobuf-encoded envelope: requests
//! carry the service path, the user payload, and transparent metadata;
//! responses carry the payload plus a return code and message. Field
//! numbers are part of the wire contract and must never be reused.
//!
//! The nested `payload` bytes use whatever serialization scheme the caller
//! chose; the envelope itself is always protobuf.

use std::collections::HashMap;

use prost::Message;

use crate::error::Result;

/// Request envelope.
#[derive(Clone, PartialEq, Message)]
pub struct Request {
    /// Routing path, format `/<service>/<method>`.
    #[prost(string, tag = "1")]
    pub service_path: String,
    /// User payload, serialized with the caller's scheme.
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    /// Transparent key-value metadata; keys are lowercase.
    #[prost(map = "string, bytes", tag = "3")]
    pub metadata: HashMap<String, Vec<u8>>,
}

/// Response envelope.
#[derive(Clone, PartialEq, Message)]
pub struct Response {
    /// Serialized response payload; empty on error.
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,
    /// 0 on success; otherwise the error code.
    #[prost(int32, tag = "2")]
    pub ret_code: i32,
    /// Human-readable status.
    #[prost(string, tag = "3")]
    pub ret_msg: String,
}

impl Request {
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn decode_from(buf: &[u8]) -> Result<Self> {
        Ok(Request::decode(buf)?)
    }
}

impl Response {
    pub fn encode_to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn decode_from(buf: &[u8]) -> Result<Self> {
        Ok(Response::decode(buf)?)
    }
}
