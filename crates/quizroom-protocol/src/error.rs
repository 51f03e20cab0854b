//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or parsing wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or a
    /// message that doesn't match any known shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The given text is not a valid room code (4 ASCII letters).
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),
}
