//! MessagePack scheme using `rmp-serde`.
//!
//! Uses `to_vec_named` so structs serialize as maps keyed by field name,
//! which keeps the encoding self-describing across peers with independently
//! evolving struct definitions.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

pub fn marshal<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub fn unmarshal<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.is_empty() {
        return Err(Error::client_msg("unmarshal empty bytes"));
    }
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        id: u32,
        name: String,
    }

    #[test]
    fn test_roundtrip() {
        let value = Sample { id: 7, name: "seven".to_string() };
        let bytes = marshal(&value).unwrap();
        let back: Sample = unmarshal(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_structs_encode_as_maps() {
        let bytes = marshal(&Sample { id: 1, name: "x".to_string() }).unwrap();
        // fixmap marker for a two-entry map
        assert_eq!(bytes[0], 0x82);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(unmarshal::<Sample>(&[]).is_err());
    }
}
