//! Core protocol types for steamrelay's wire format.
//!
//! Everything here travels between the caller, the gateway, and the
//! agent as JSON. Field names are fixed by the gateway and must not be
//! renamed.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Caller-generated correlation id for one command.
///
/// Newtype over `String` so it can't be confused with a login or an
/// agent token in function signatures. Serialized as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pulls `request_id` out of a frame that failed to decode as a
    /// [`CommandEnvelope`].
    ///
    /// Returns `None` if the frame isn't a JSON object or carries no
    /// string `request_id`, in which case there is nobody to answer.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(data).ok()?;
        value
            .get("request_id")
            .and_then(Value::as_str)
            .map(|s| Self(s.to_owned()))
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Command / response envelopes
// ---------------------------------------------------------------------------

/// An inbound command as it appears on the wire.
///
/// ```json
/// {"cmd": "market_fetch_price", "account_login": "alice",
///  "args": {"item_hash_name": "AK-47 | Redline", "app_id": "730", "currency": 1},
///  "request_id": "2b6c..."}
/// ```
///
/// `cmd` and `account_login` default to empty strings so an envelope
/// missing them still decodes and can be answered with
/// `invalid_argument` instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub account_login: String,
    #[serde(default)]
    pub args: Value,
    pub request_id: RequestId,
}

/// Outcome marker of a [`ResponseEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

/// Typed error code carried alongside the human-readable message.
///
/// Serialized as snake_case so `ErrorCode::RateLimited` becomes
/// `"rate_limited"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A login-protocol step failed.
    ProtocolError,
    /// A network read kept failing after every retry.
    TransientNetwork,
    /// Steam answered HTTP 429.
    RateLimited,
    /// Arguments were missing or invalid; nothing was sent to Steam.
    InvalidArgument,
    /// The credential store lacks a field needed to log in.
    MissingCredential,
    /// The order went through but its mobile confirmation did not.
    ConfirmationFailed,
    /// The agent could not be reached.
    AgentUnreachable,
    /// The `cmd` is not implemented by this agent.
    UnknownCommand,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ProtocolError => "protocol_error",
            Self::TransientNetwork => "transient_network",
            Self::RateLimited => "rate_limited",
            Self::InvalidArgument => "invalid_argument",
            Self::MissingCredential => "missing_credential",
            Self::ConfirmationFailed => "confirmation_failed",
            Self::AgentUnreachable => "agent_unreachable",
            Self::UnknownCommand => "unknown_command",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// The single answer to a [`CommandEnvelope`].
///
/// `message` also accepts an `error` key on input: the gateway reports
/// its own failures ("Agent is offline") under that name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub request_id: RequestId,
}

impl ResponseEnvelope {
    /// Builds a success response carrying `result`.
    pub fn success(request_id: RequestId, result: Value) -> Self {
        Self {
            status: Status::Success,
            result: Some(result),
            message: None,
            code: None,
            request_id,
        }
    }

    /// Builds an error response.
    pub fn error(
        request_id: RequestId,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: Status::Error,
            result: None,
            message: Some(message.into()),
            code: Some(code),
            request_id,
        }
    }

    /// Returns `true` if `status` is `success`.
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

// ---------------------------------------------------------------------------
// Agent → gateway control messages
// ---------------------------------------------------------------------------

/// Messages the agent sends on its own initiative.
///
/// Internally tagged, so the manifest is
/// `{"type": "manifest", "logins": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Sent once, right after connecting: the logins this agent serves.
    Manifest { logins: Vec<String> },
}

// ---------------------------------------------------------------------------
// Caller → relay
// ---------------------------------------------------------------------------

/// What the caller publishes on the relay topic: the command envelope
/// plus the token of the agent that should run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub target_token: String,
    #[serde(flatten)]
    pub envelope: CommandEnvelope,
}
