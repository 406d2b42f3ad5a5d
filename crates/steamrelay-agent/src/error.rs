//! Error types for the agent's local files and startup.

use std::path::PathBuf;

use steamrelay::ChannelError;
use steamrelay_session::SessionError;
use steamrelay_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required setting is empty after file and environment.
    #[error("{0} is not configured")]
    MissingSetting(&'static str),

    #[error("no maFiles found in {0}")]
    NoAccounts(PathBuf),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl AgentError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Credential store failures surface to the session layer as `Store`.
impl From<AgentError> for SessionError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Session(inner) => inner,
            other => SessionError::Store(other.to_string()),
        }
    }
}
