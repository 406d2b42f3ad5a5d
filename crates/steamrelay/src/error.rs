//! Error types for the agent side.
//!
//! [`CommandError`] is what a single command can fail with; it collapses
//! the per-crate errors into the [`ErrorCode`] sent back on the wire.
//! [`ChannelError`] ends a gateway connection.

use std::time::Duration;

use steamrelay_market::MarketError;
use steamrelay_protocol::{ErrorCode, WireError};
use steamrelay_session::SessionError;
use steamrelay_transport::TransportError;

/// Why one command failed.
///
/// The `#[from]` conversions let dispatch code use `?` on calls into any
/// of the lower crates.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Bad envelope or arguments; nothing was sent to Steam.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Checkout, login, or a session liveness check failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A market, inventory, or trade call failed.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The agent is shutting down.
    #[error("command cancelled")]
    Cancelled,
}

impl CommandError {
    /// Shorthand for an argument problem found outside `Command::parse`.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::Wire(WireError::InvalidArgument(message.into()))
    }

    /// The code sent back to the caller.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Wire(WireError::UnknownCommand(_)) => ErrorCode::UnknownCommand,
            Self::Wire(WireError::InvalidArgument(_) | WireError::Decode(_)) => {
                ErrorCode::InvalidArgument
            }
            Self::Wire(WireError::Encode(_)) => ErrorCode::Internal,
            Self::Session(e) => session_code(e),
            Self::Market(MarketError::RateLimited(_)) => ErrorCode::RateLimited,
            Self::Market(MarketError::ConfirmationFailed(_)) => ErrorCode::ConfirmationFailed,
            Self::Market(MarketError::Session(e)) => session_code(e),
            Self::Market(e) if e.is_transient() => ErrorCode::TransientNetwork,
            Self::Market(_) | Self::Cancelled => ErrorCode::Internal,
        }
    }

    /// Returns `true` if a later attempt might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Session(e) => e.is_transient(),
            Self::Market(e) => e.is_transient(),
            Self::Wire(_) | Self::Cancelled => false,
        }
    }

    /// Returns `true` if the failure suggests the session itself went
    /// stale and shouldn't be handed out again.
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Self::Session(SessionError::NotAlive(_))
                | Self::Market(MarketError::Session(SessionError::NotAlive(_)))
                | Self::Market(MarketError::Status {
                    status: 401 | 403,
                    ..
                })
        )
    }
}

fn session_code(e: &SessionError) -> ErrorCode {
    match e {
        SessionError::Protocol { .. } | SessionError::NotAlive(_) => ErrorCode::ProtocolError,
        SessionError::MissingCredential { .. } | SessionError::InvalidSecret(_) => {
            ErrorCode::MissingCredential
        }
        SessionError::Http(_) if e.is_transient() => ErrorCode::TransientNetwork,
        SessionError::Store(_) | SessionError::Http(_) => ErrorCode::Internal,
    }
}

/// Why a gateway connection ended.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The gateway closed the connection.
    #[error("closed by gateway")]
    Closed,

    /// No pong came back for a ping within the tolerance.
    #[error("no pong within {0:?}")]
    PongTimeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

#[cfg(test)]
mod tests {
    use steamrelay_session::LoginStep;

    use super::*;

    #[test]
    fn test_code_for_wire_errors() {
        assert_eq!(
            CommandError::invalid_argument("missing cmd").code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(
            CommandError::from(WireError::UnknownCommand("fly".into())).code(),
            ErrorCode::UnknownCommand
        );
    }

    #[test]
    fn test_code_for_session_errors() {
        let missing = CommandError::from(SessionError::MissingCredential {
            login: "alice".into(),
            field: "password",
        });
        assert_eq!(missing.code(), ErrorCode::MissingCredential);

        let protocol = CommandError::from(SessionError::Protocol {
            step: LoginStep::Polled,
            message: "no refresh token".into(),
        });
        assert_eq!(protocol.code(), ErrorCode::ProtocolError);
        assert!(!protocol.is_transient());
    }

    #[test]
    fn test_code_for_market_errors() {
        let limited = CommandError::from(MarketError::RateLimited("priceoverview".into()));
        assert_eq!(limited.code(), ErrorCode::RateLimited);
        assert!(!limited.is_transient());

        let confirm = CommandError::from(MarketError::ConfirmationFailed("refused".into()));
        assert_eq!(confirm.code(), ErrorCode::ConfirmationFailed);

        let bad_gateway = CommandError::from(MarketError::Status {
            context: "market page",
            status: 502,
        });
        assert_eq!(bad_gateway.code(), ErrorCode::TransientNetwork);
        assert!(bad_gateway.is_transient());

        let nested = CommandError::from(MarketError::Session(SessionError::NotAlive(
            "alice".into(),
        )));
        assert_eq!(nested.code(), ErrorCode::ProtocolError);
        assert!(nested.invalidates_session());
    }

    #[test]
    fn test_forbidden_status_invalidates_session() {
        let forbidden = CommandError::from(MarketError::Status {
            context: "market page",
            status: 403,
        });
        assert!(forbidden.invalidates_session());
        assert_eq!(forbidden.code(), ErrorCode::Internal);
    }
}
