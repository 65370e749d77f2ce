//! Pluggable value ↔ bytes serialization.
//!
//! Three schemes ship with the crate: protobuf (the default), MessagePack,
//! and JSON. The scheme for a call's payload is chosen per call and is
//! independent of the envelope encoding, which is always protobuf.
//!
//! Scheme dispatch is monomorphized: a value type opts into the wire by
//! implementing [`Payload`], normally through [`impl_payload_serde!`] (for
//! `serde` types, covering msgpack and json) or [`impl_payload_proto!`]
//! (for `prost` types, covering protobuf). Asking a type for a scheme it
//! does not support is a runtime framework error, mirroring how a dynamic
//! implementation would fail its type assertion.
//!
//! Scheme names resolve through a process-wide alias table; unknown names
//! fall back to protobuf.

pub mod json;
pub mod msgpack;
pub mod protobuf;

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::error::Result;

/// Canonical scheme names.
pub const PROTOBUF: &str = "protobuf";
pub const MSGPACK: &str = "msgpack";
pub const JSON: &str = "json";

/// Serialization scheme selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationType {
    #[default]
    Protobuf,
    MsgPack,
    Json,
}

impl SerializationType {
    /// Canonical name of this scheme.
    pub fn name(&self) -> &'static str {
        match self {
            SerializationType::Protobuf => PROTOBUF,
            SerializationType::MsgPack => MSGPACK,
            SerializationType::Json => JSON,
        }
    }
}

static NAMES: Lazy<RwLock<HashMap<String, SerializationType>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(PROTOBUF.to_string(), SerializationType::Protobuf);
    map.insert(MSGPACK.to_string(), SerializationType::MsgPack);
    map.insert(JSON.to_string(), SerializationType::Json);
    RwLock::new(map)
});

/// Register an alias for a scheme, replacing any prior entry.
pub fn register(name: impl Into<String>, scheme: SerializationType) {
    NAMES.write().unwrap().insert(name.into(), scheme);
}

/// Resolve a scheme by name; unknown names get the protobuf default.
pub fn get(name: &str) -> SerializationType {
    NAMES.read().unwrap().get(name).copied().unwrap_or_default()
}

/// A value that can cross the wire under some serialization scheme.
pub trait Payload: Send + Sized + 'static {
    fn marshal(&self, scheme: SerializationType) -> Result<Vec<u8>>;
    fn unmarshal(scheme: SerializationType, bytes: &[u8]) -> Result<Self>;
}

/// Implement [`Payload`] for `serde` types: msgpack and json work, the
/// protobuf scheme is a runtime mismatch error.
#[macro_export]
macro_rules! impl_payload_serde {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::serialization::Payload for $ty {
            fn marshal(
                &self,
                scheme: $crate::serialization::SerializationType,
            ) -> $crate::Result<::std::vec::Vec<u8>> {
                match scheme {
                    $crate::serialization::SerializationType::MsgPack => {
                        $crate::serialization::msgpack::marshal(self)
                    }
                    $crate::serialization::SerializationType::Json => {
                        $crate::serialization::json::marshal(self)
                    }
                    $crate::serialization::SerializationType::Protobuf => {
                        Err($crate::Error::client_msg(concat!(
                            stringify!($ty),
                            " does not support the protobuf scheme"
                        )))
                    }
                }
            }

            fn unmarshal(
                scheme: $crate::serialization::SerializationType,
                bytes: &[u8],
            ) -> $crate::Result<Self> {
                match scheme {
                    $crate::serialization::SerializationType::MsgPack => {
                        $crate::serialization::msgpack::unmarshal(bytes)
                    }
                    $crate::serialization::SerializationType::Json => {
                        $crate::serialization::json::unmarshal(bytes)
                    }
                    $crate::serialization::SerializationType::Protobuf => {
                        Err($crate::Error::client_msg(concat!(
                            stringify!($ty),
                            " does not support the protobuf scheme"
                        )))
                    }
                }
            }
        }
    )+};
}

/// Implement [`Payload`] for `prost` types: protobuf works, the serde-based
/// schemes are a runtime mismatch error.
#[macro_export]
macro_rules! impl_payload_proto {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::serialization::Payload for $ty {
            fn marshal(
                &self,
                scheme: $crate::serialization::SerializationType,
            ) -> $crate::Result<::std::vec::Vec<u8>> {
                match scheme {
                    $crate::serialization::SerializationType::Protobuf => {
                        $crate::serialization::protobuf::marshal(self)
                    }
                    other => Err($crate::Error::client_msg(::std::format!(
                        "{} does not support the {} scheme",
                        stringify!($ty),
                        other.name()
                    ))),
                }
            }

            fn unmarshal(
                scheme: $crate::serialization::SerializationType,
                bytes: &[u8],
            ) -> $crate::Result<Self> {
                match scheme {
                    $crate::serialization::SerializationType::Protobuf => {
                        $crate::serialization::protobuf::unmarshal(bytes)
                    }
                    other => Err($crate::Error::client_msg(::std::format!(
                        "{} does not support the {} scheme",
                        stringify!($ty),
                        other.name()
                    ))),
                }
            }
        }
    )+};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Greeting {
        msg: String,
    }

    crate::impl_payload_serde!(Greeting);

    #[derive(Clone, PartialEq, prost::Message)]
    struct ProtoGreeting {
        #[prost(string, tag = "1")]
        msg: String,
    }

    crate::impl_payload_proto!(ProtoGreeting);

    #[test]
    fn test_name_lookup_defaults_to_protobuf() {
        assert_eq!(get("msgpack"), SerializationType::MsgPack);
        assert_eq!(get("json"), SerializationType::Json);
        assert_eq!(get("protobuf"), SerializationType::Protobuf);
        assert_eq!(get("no-such-scheme"), SerializationType::Protobuf);
    }

    #[test]
    fn test_alias_registration_overwrites() {
        register("compact", SerializationType::MsgPack);
        assert_eq!(get("compact"), SerializationType::MsgPack);
        register("compact", SerializationType::Json);
        assert_eq!(get("compact"), SerializationType::Json);
    }

    #[test]
    fn test_serde_payload_roundtrip() {
        let value = Greeting { msg: "hello".to_string() };
        for scheme in [SerializationType::MsgPack, SerializationType::Json] {
            let bytes = value.marshal(scheme).unwrap();
            let back = Greeting::unmarshal(scheme, &bytes).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_serde_payload_rejects_protobuf() {
        let value = Greeting { msg: "hello".to_string() };
        assert!(value.marshal(SerializationType::Protobuf).is_err());
    }

    #[test]
    fn test_proto_payload_roundtrip() {
        let value = ProtoGreeting { msg: "hello".to_string() };
        let bytes = value.marshal(SerializationType::Protobuf).unwrap();
        let back = ProtoGreeting::unmarshal(SerializationType::Protobuf, &bytes).unwrap();
        assert_eq!(back, value);
        assert!(value.marshal(SerializationType::Json).is_err());
    }
}
