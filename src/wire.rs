//! Canonical binary wire codec shared with the consensus engine
//!
//! Envelopes go out and query results come back in this encoding. The byte
//! layout is an opaque contract with the engine: both sides must agree
//! bit-for-bit, so all encoding in the crate funnels through these two
//! functions.

use crate::error::{BridgeError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a value into the canonical wire encoding.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| BridgeError::DecodeError(format!(
        "Failed to encode wire payload: {}",
        e
    )))
}

/// Decode a wire payload into a typed value. Failure means the remote bytes
/// did not match the expected shape (protocol or version skew) and is fatal
/// to the operation.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| BridgeError::DecodeError(format!(
        "Failed to decode wire payload: {}",
        e
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_counter_round_trip() {
        let encoded = encode(&7u32).unwrap();
        let decoded: u32 = decode(&encoded).unwrap();
        assert_eq!(decoded, 7);
    }

    #[test]
    fn test_decode_failure_is_decode_error() {
        let result = decode::<String>(&[0xff, 0xff]);
        assert!(matches!(result, Err(BridgeError::DecodeError(_))));
    }
}
