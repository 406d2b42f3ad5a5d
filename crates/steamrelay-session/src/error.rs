//! Error types for the session layer.

use crate::LoginStep;

/// Errors that can occur while logging in, resuming, or probing a
/// Steam session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A step of the login protocol failed. The attempt is over and no
    /// session was cached.
    #[error("login step {step} failed: {message}")]
    Protocol { step: LoginStep, message: String },

    /// The credential store lacks a field required to log in.
    #[error("missing credential for {login}: {field}")]
    MissingCredential { login: String, field: &'static str },

    /// A Steam Guard secret isn't valid base64.
    #[error("invalid guard secret: {0}")]
    InvalidSecret(String),

    /// Login finished but the new session doesn't look logged in.
    #[error("session for {0} is not alive after login")]
    NotAlive(String),

    /// The credential store itself failed (I/O, malformed file).
    #[error("credential store: {0}")]
    Store(String),

    /// HTTP transport failure (connect, timeout, body read).
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

impl SessionError {
    /// Returns `true` for failures worth retrying: the request never got
    /// a usable answer from Steam.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }

    pub(crate) fn protocol(step: LoginStep, message: impl Into<String>) -> Self {
        Self::Protocol {
            step,
            message: message.into(),
        }
    }
}
