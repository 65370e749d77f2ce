//! Protobuf scheme using `prost`.

use prost::Message;

use crate::error::{Error, Result};

pub fn marshal<T: Message>(value: &T) -> Result<Vec<u8>> {
    Ok(value.encode_to_vec())
}

pub fn unmarshal<T: Message + Default>(bytes: &[u8]) -> Result<T> {
    if bytes.is_empty() {
        return Err(Error::client_msg("unmarshal empty bytes"));
    }
    Ok(T::decode(bytes)?)
}
