//! Codec trait and implementations for serializing/deserializing messages.
//!
//! Both hops of the relay carry JSON text today, but nothing above this
//! module depends on that: the channel and the bridge only need something
//! that implements [`Codec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::WireError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every command task spawned by the channel.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `WireError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, WireError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `WireError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, WireError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The gateway and the Redis relay both speak JSON, so this is the codec
/// every production path uses.
///
/// ## Example
///
/// ```rust
/// use steamrelay_protocol::{Codec, JsonCodec, AgentMessage};
///
/// let codec = JsonCodec;
/// let manifest = AgentMessage::Manifest { logins: vec!["alice".into()] };
///
/// let bytes = codec.encode(&manifest).unwrap();
/// assert_eq!(bytes, br#"{"type":"manifest","logins":["alice"]}"#);
///
/// let decoded: AgentMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(manifest, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(value).map_err(WireError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, WireError> {
        serde_json::from_slice(data).map_err(WireError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{CommandEnvelope, RequestId};

    #[test]
    fn test_json_codec_decode_command_envelope() {
        let raw = br#"{"cmd":"is_session_alive","account_login":"alice","request_id":"r-1"}"#;
        let env: CommandEnvelope = JsonCodec.decode(raw).unwrap();
        assert_eq!(env.cmd, "is_session_alive");
        assert_eq!(env.request_id, RequestId::from("r-1"));
        assert!(env.args.is_null());
    }

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<CommandEnvelope, _> = JsonCodec.decode(b"not json{");
        assert!(matches!(result, Err(WireError::Decode(_))));
    }
}
