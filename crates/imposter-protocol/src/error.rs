//! Error types for the protocol layer.

/// Errors that can occur while decoding, encoding, or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown event name, or a
    /// payload of the wrong shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A display name was empty or too long.
    #[error("invalid display name: {0}")]
    InvalidName(String),

    /// A room code was empty, too long, or contained non-alphanumerics.
    #[error("invalid room code: {0}")]
    InvalidCode(String),
}
