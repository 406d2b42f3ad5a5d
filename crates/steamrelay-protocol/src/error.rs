//! Error types for the protocol layer.
//!
//! Each steamrelay crate defines its own error enum. A `WireError` means
//! the problem is in the shape of a message (bytes, JSON, arguments),
//! never in the network or in Steam itself.

/// Errors that can occur while encoding, decoding, or validating commands.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong types.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The command's arguments are missing or out of range.
    ///
    /// Raised before any network call is made, so callers can answer
    /// the request immediately.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The `cmd` field names a command this agent does not implement.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}
