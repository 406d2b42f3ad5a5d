//! Error types for market, inventory, and trade calls.

use steamrelay_session::SessionError;

/// Errors from calls against an authenticated session.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Steam answered 429. Not retried automatically.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Steam answered with an unexpected HTTP status.
    #[error("{context}: http status {status}")]
    Status { context: &'static str, status: u16 },

    /// Steam answered, but reported failure.
    #[error("steam api: {0}")]
    Api(String),

    /// The order went through but its mobile confirmation did not.
    #[error("mobile confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// A page or JSON body didn't have the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

impl MarketError {
    /// Returns `true` for failures a later attempt may not hit:
    /// connection trouble and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Session(e) => e.is_transient(),
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }

    /// Recasts a failure of the mobile confirmation step. The order or
    /// offer already exists on Steam by then, so the caller must not see
    /// a plain network error that invites a blind retry.
    pub(crate) fn during_confirmation(self) -> Self {
        match self {
            Self::ConfirmationFailed(_) => self,
            other => Self::ConfirmationFailed(format!("placed, but confirming it failed: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_transient_only_for_server_errors() {
        let bad_gateway = MarketError::Status {
            context: "market page",
            status: 502,
        };
        let forbidden = MarketError::Status {
            context: "market page",
            status: 403,
        };
        assert!(bad_gateway.is_transient());
        assert!(!forbidden.is_transient());
        assert_eq!(forbidden.to_string(), "market page: http status 403");
    }

    #[test]
    fn test_rate_limited_is_not_transient() {
        assert!(!MarketError::RateLimited("429".into()).is_transient());
        assert!(!MarketError::ConfirmationFailed("x".into()).is_transient());
    }

    #[test]
    fn test_during_confirmation_wraps_once() {
        let wrapped = MarketError::Status {
            context: "confirmation list",
            status: 500,
        }
        .during_confirmation();
        assert!(matches!(wrapped, MarketError::ConfirmationFailed(_)));
        assert!(!wrapped.is_transient());
        assert!(wrapped.to_string().contains("http status 500"));

        let refused = MarketError::ConfirmationFailed("refused".into()).during_confirmation();
        assert_eq!(refused.to_string(), "mobile confirmation failed: refused");
    }
}
