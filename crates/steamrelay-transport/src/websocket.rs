//! WebSocket client connection using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An outbound WebSocket connection to the gateway.
///
/// The socket is split so a pending `recv` never blocks a `send`: each
/// half sits behind its own lock.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    /// When the last pong arrived; the connect time until then.
    last_pong: std::sync::Mutex<Instant>,
}

impl WebSocketConnection {
    /// Dials `url` and authenticates with `token` in the `Authorization`
    /// header (the raw token, no scheme prefix).
    pub async fn connect(url: &str, token: &str) -> Result<Self, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| connect_failed(url, e))?;
        let value = HeaderValue::from_str(token)
            .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| connect_failed(url, e))?;
        let (sink, stream) = ws.split();

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, url, "WebSocket connection established");

        Ok(Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            last_pong: std::sync::Mutex::new(Instant::now()),
        })
    }

    fn record_pong(&self) {
        let now = Instant::now();
        match self.last_pong.lock() {
            Ok(mut last) => *last = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

fn connect_failed(url: &str, e: tungstenite::Error) -> TransportError {
    TransportError::ConnectFailed {
        url: url.to_owned(),
        source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e),
    }
}

fn send_failed(e: tungstenite::Error) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        // The gateway speaks JSON text frames; anything else goes binary.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(send_failed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Pong(_))) => self.record_pong(),
                // tungstenite queues the pong reply itself.
                Some(Ok(Message::Ping(_))) => continue,
                Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(id = %self.id, ?frame, "close frame received");
                    return Ok(None);
                }
                None => return Ok(None),
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Default::default()))
            .await
            .map_err(send_failed)
    }

    fn last_pong(&self) -> Instant {
        match self.last_pong.lock() {
            Ok(last) => *last,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(send_failed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
