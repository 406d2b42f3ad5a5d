/// Failures of the agent's gateway connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Dialing the gateway or the WebSocket upgrade failed.
    #[error("connect to {url} failed: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The agent token can't be carried in an HTTP header.
    #[error("invalid authorization header: {0}")]
    InvalidHeader(String),

    /// Writing a frame or ping to the gateway failed.
    #[error("send to gateway failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The gateway socket errored while reading.
    #[error("receive from gateway failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
