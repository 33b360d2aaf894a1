//! Codec trait and implementations for serializing/deserializing envelopes.
//!
//! The server only speaks text frames, so a codec turns values into a
//! `String` and parses raw frame bytes back.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to text frames and decodes frames back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a received frame.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`. Browsers can read it directly.
///
/// ```rust
/// use imposter_protocol::{ClientEvent, Codec, Envelope, JsonCodec, RoomCode};
///
/// let codec = JsonCodec;
/// let request = Envelope::request(
///     3,
///     ClientEvent::StartGame { code: RoomCode::parse("wolf7").unwrap() },
/// );
///
/// let frame = codec.encode(&request).unwrap();
/// assert!(frame.contains(r#""event":"startGame""#));
///
/// let decoded: Envelope<ClientEvent> = codec.decode(frame.as_bytes()).unwrap();
/// assert_eq!(decoded, request);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
