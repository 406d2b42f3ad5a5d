//! Transport abstraction layer for steamrelay.
//!
//! The agent never listens: it dials out to the gateway and keeps one
//! long-lived connection. [`Connection`] abstracts that connection so the
//! command channel can be driven by anything that moves byte frames and
//! answers pings.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`
//! - `tls`: `wss://` support through rustls with webpki roots

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::fmt;
use std::time::Instant;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connectivity as reported to the supervising layer.
///
/// ```text
/// Connecting ──→ Connected ──(close / pong timeout / error)──→ Disconnected
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected { reason: String },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected { reason } => write!(f, "disconnected: {reason}"),
        }
    }
}

/// A single connection that can send and receive frames.
///
/// Sending and receiving may happen concurrently from the same task
/// (inside a `select!`), so implementations must not hold one lock
/// across both directions.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next data frame from the remote peer.
    ///
    /// Control frames are handled internally. Returns `Ok(None)` when the
    /// connection is cleanly closed. Must be cancel-safe: dropping the
    /// future loses no frame.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Sends a liveness ping. The answer shows up in
    /// [`last_pong`](Self::last_pong) once `recv` has read it.
    async fn ping(&self) -> Result<(), Self::Error>;

    /// When the last pong (or the connection itself) was observed.
    fn last_pong(&self) -> Instant;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
        assert_eq!(id.into_inner(), 7);
    }

    #[test]
    fn test_connection_status_is_connected() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(
            !ConnectionStatus::Disconnected {
                reason: "pong timeout".into()
            }
            .is_connected()
        );
    }

    #[test]
    fn test_connection_status_display_includes_reason() {
        let status = ConnectionStatus::Disconnected {
            reason: "closed by gateway".into(),
        };
        assert_eq!(status.to_string(), "disconnected: closed by gateway");
    }
}
