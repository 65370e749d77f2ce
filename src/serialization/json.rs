//! JSON scheme using `serde_json`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

pub fn marshal<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn unmarshal<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.is_empty() {
        return Err(Error::client_msg("unmarshal empty bytes"));
    }
    Ok(serde_json::from_slice(bytes)?)
}
