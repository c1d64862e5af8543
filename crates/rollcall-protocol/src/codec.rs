//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The server never touches `serde_json` directly; it goes through a
//! [`Codec`] so a binary format can be slotted in later without changing
//! the handler.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON keeps the protocol easy to drive from a browser or `websocat`
/// during a lecture. Behind the `json` feature flag (enabled by default).
///
/// ```rust
/// use rollcall_protocol::{Codec, Envelope, JsonCodec, Payload, Request};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"seq":3,"payload":{"type":"Request","data":{"type":"Ping","client_time":7}}}"#;
/// let envelope: Envelope = codec.decode(bytes).unwrap();
/// assert_eq!(envelope.seq, 3);
/// assert!(matches!(
///     envelope.payload,
///     Payload::Request(Request::Ping { client_time: 7 })
/// ));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, Payload, Response};

    #[test]
    fn test_json_codec_encodes_response_envelope() {
        let envelope = Envelope {
            seq: 9,
            timestamp: 1200,
            payload: Payload::Response(Response::Pong {
                client_time: 1,
                server_time: 1200,
            }),
        };

        let bytes = JsonCodec.encode(&envelope).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["seq"], 9);
        assert_eq!(json["payload"]["type"], "Response");
        assert_eq!(json["payload"]["data"]["type"], "Pong");
    }

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"attendance please");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
