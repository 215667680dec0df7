//! JSON codec for envelopes.
//!
//! Decoding is all-or-nothing: a payload either yields the complete target
//! type or a [`DecodeError`].

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// The value could not be represented as JSON.
#[derive(Debug, thiserror::Error)]
#[error("encode failed: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// The payload was malformed or did not match the expected schema.
#[derive(Debug, thiserror::Error)]
#[error("decode failed: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Serializes `value` into a broker payload.
///
/// # Errors
///
/// Returns [`EncodeError`] if serialization fails (for example a map with
/// non-string keys).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, EncodeError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Deserializes a broker payload into `T`.
///
/// # Errors
///
/// Returns [`DecodeError`] on malformed JSON, missing required fields or
/// type mismatches.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::contract::{CommandRequest, IdRequest};
    use crate::domain::CreateUserInput;

    #[test]
    fn malformed_bytes_fail() {
        let result = decode::<CommandRequest<IdRequest>>(b"{not json");
        assert!(result.is_err());
    }

    #[test]
    fn missing_required_field_fails_instead_of_partial_value() {
        let raw = br#"{"requestId":"1","data":{"firstName":"Jo","lastName":"Do"}}"#;
        assert!(decode::<CommandRequest<CreateUserInput>>(raw).is_err());
    }

    #[test]
    fn type_mismatch_fails() {
        let raw = br#"{"requestId":"1","data":{"id":42}}"#;
        assert!(decode::<CommandRequest<IdRequest>>(raw).is_err());
    }

    #[test]
    fn encode_then_decode_preserves_value() {
        let req = CommandRequest::new(IdRequest {
            id: "11111111-1111-1111-1111-111111111111".to_string(),
        });
        let Ok(bytes) = encode(&req) else {
            panic!("encode failed");
        };
        let Ok(back) = decode::<CommandRequest<IdRequest>>(&bytes) else {
            panic!("decode failed");
        };
        assert_eq!(back, req);
    }
}
