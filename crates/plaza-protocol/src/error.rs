//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed — malformed bytes, missing fields, or an
    /// unknown event tag. Rejected per-event; never fatal to a connection.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A structurally valid message that violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
