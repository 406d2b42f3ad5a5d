//! Error types for the caller side of the relay.

use steamrelay_protocol::{ErrorCode, WireError};

/// Errors a caller sees from [`RpcBridge`](crate::RpcBridge).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No response arrived in time, or the gateway said the agent is gone.
    #[error("agent {target} unreachable: {reason}")]
    AgentUnreachable { target: String, reason: String },

    /// An earlier call to this agent already failed as unreachable.
    #[error("agent {0} is quarantined")]
    Quarantined(String),

    /// The agent ran the command and reported an error.
    #[error("agent error for command '{cmd}': {message}")]
    Remote {
        cmd: String,
        code: Option<ErrorCode>,
        message: String,
    },

    /// The relay itself misbehaved, e.g. a wait on an unknown id.
    #[error("relay failure: {0}")]
    Relay(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

impl BridgeError {
    /// Returns `true` for the two outcomes that mean "this agent is gone".
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::AgentUnreachable { .. } | Self::Quarantined(_))
    }

    /// The error code the agent attached, if this is a remote error.
    pub fn remote_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Remote { code, .. } => *code,
            Self::AgentUnreachable { .. } | Self::Quarantined(_) => {
                Some(ErrorCode::AgentUnreachable)
            }
            _ => None,
        }
    }
}
