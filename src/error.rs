//! Error types for callwire.
//!
//! Errors fall into three wire-visible kinds, distinguished by code range:
//! framework errors (malformed input, protocol violations), business errors
//! (returned by user handlers, code/message carried verbatim), and the
//! server-internal catch-all. Local I/O and serialization failures never
//! cross the wire; they surface on the side that produced them.

use thiserror::Error;

/// Numeric codes carried in the `ret_code` field of response envelopes.
pub mod codes {
    /// Success.
    pub const OK: i32 = 0;
    /// Malformed request, bad service path, protocol violation.
    pub const CLIENT_MSG_ERROR: i32 = 400;
    /// Requested network type is not supported.
    pub const NETWORK_NOT_SUPPORTED: i32 = 401;
    /// Invalid configuration.
    pub const CONFIG_ERROR: i32 = 402;
    /// Uncategorized server-side failure.
    pub const SERVER_INTERNAL_ERROR: i32 = 500;
}

/// Main error type for all callwire operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope decode error (protobuf).
    #[error("envelope decode error: {0}")]
    EnvelopeDecode(#[from] prost::DecodeError),

    /// MsgPack serialization error.
    #[error("msgpack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("msgpack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol violation or invalid argument, with a framework code.
    #[error("framework error {code}: {message}")]
    Framework { code: i32, message: String },

    /// Error raised by a user handler; code and message travel to the
    /// caller unchanged.
    #[error("business error {code}: {message}")]
    Business { code: i32, message: String },

    /// Uncategorized server-side failure.
    #[error("server internal error: {0}")]
    ServerInternal(String),

    /// A deadline elapsed before the operation completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// The requested network type is not supported.
    #[error("network type not supported: {0}")]
    NetworkNotSupported(String),
}

impl Error {
    /// Framework error with an explicit code.
    pub fn framework(code: i32, message: impl Into<String>) -> Self {
        Error::Framework { code, message: message.into() }
    }

    /// Framework error with [`codes::CLIENT_MSG_ERROR`].
    pub fn client_msg(message: impl Into<String>) -> Self {
        Self::framework(codes::CLIENT_MSG_ERROR, message)
    }

    /// Business error carrying a user-chosen code and message.
    pub fn business(code: i32, message: impl Into<String>) -> Self {
        Error::Business { code, message: message.into() }
    }

    /// Server-internal catch-all.
    pub fn server_internal(message: impl Into<String>) -> Self {
        Error::ServerInternal(message.into())
    }

    /// The numeric code of this error as seen on the wire.
    pub fn code(&self) -> i32 {
        match self {
            Error::Framework { code, .. } | Error::Business { code, .. } => *code,
            _ => codes::SERVER_INTERNAL_ERROR,
        }
    }

    /// Map a handler-side failure onto the `(ret_code, ret_msg)` pair of a
    /// response envelope. Framework and business errors keep their code and
    /// message; everything else collapses into the internal catch-all.
    pub(crate) fn to_ret(&self) -> (i32, String) {
        match self {
            Error::Framework { code, message } | Error::Business { code, message } => {
                (*code, message.clone())
            }
            Error::ServerInternal(message) => (codes::SERVER_INTERNAL_ERROR, message.clone()),
            other => (codes::SERVER_INTERNAL_ERROR, other.to_string()),
        }
    }

    /// True when the underlying cause is the peer ending the stream mid-read,
    /// which the server's per-connection loop treats as a clean close.
    pub(crate) fn is_eof(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_error_keeps_code_and_message() {
        let err = Error::business(42, "nope");
        let (code, msg) = err.to_ret();
        assert_eq!(code, 42);
        assert_eq!(msg, "nope");
    }

    #[test]
    fn test_framework_error_keeps_code() {
        let err = Error::client_msg("invalid magic");
        assert_eq!(err.code(), codes::CLIENT_MSG_ERROR);
        let (code, msg) = err.to_ret();
        assert_eq!(code, codes::CLIENT_MSG_ERROR);
        assert_eq!(msg, "invalid magic");
    }

    #[test]
    fn test_uncategorized_error_becomes_internal() {
        let err = Error::DeadlineExceeded;
        let (code, _) = err.to_ret();
        assert_eq!(code, codes::SERVER_INTERNAL_ERROR);
    }

    #[test]
    fn test_is_eof() {
        let eof = Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "early eof",
        ));
        assert!(eof.is_eof());
        assert!(!Error::ConnectionClosed.is_eof());
    }
}
