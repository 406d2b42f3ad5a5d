//! Integration tests for the WebSocket client connection.
//!
//! Each test spins up a real tungstenite server on `127.0.0.1:0` and
//! dials it with [`WebSocketConnection::connect`], so frames actually
//! cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use steamrelay_transport::{Connection, TransportError, WebSocketConnection};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request, Response,
    };

    /// Starts a server that records the `Authorization` header of the
    /// first client and echoes every data frame back.
    async fn start_echo_server() -> (String, Arc<Mutex<Option<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_task = Arc::clone(&seen);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                *seen_in_task.lock().unwrap() = auth;
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(_) | Message::Binary(_) => {
                        if ws.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        (format!("ws://{addr}"), seen)
    }

    #[tokio::test]
    async fn test_connect_sends_raw_token_in_authorization_header() {
        let (url, seen) = start_echo_server().await;
        let conn = WebSocketConnection::connect(&url, "agent-token-123")
            .await
            .expect("should connect");

        assert!(conn.id().into_inner() > 0);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("agent-token-123"));
    }

    #[tokio::test]
    async fn test_send_and_recv_round_trip_text_frame() {
        let (url, _) = start_echo_server().await;
        let conn = WebSocketConnection::connect(&url, "t").await.unwrap();

        conn.send(br#"{"type":"manifest","logins":[]}"#).await.unwrap();
        let echoed = conn.recv().await.unwrap().expect("should have data");
        assert_eq!(echoed, br#"{"type":"manifest","logins":[]}"#);
    }

    #[tokio::test]
    async fn test_ping_updates_last_pong_once_read() {
        let (url, _) = start_echo_server().await;
        let conn = WebSocketConnection::connect(&url, "t").await.unwrap();
        let before = conn.last_pong();

        tokio::time::sleep(Duration::from_millis(20)).await;
        conn.ping().await.unwrap();
        // The pong precedes the echo on the wire, so reading the echo
        // means the pong has been processed.
        conn.send(b"after-ping").await.unwrap();
        let echoed = conn.recv().await.unwrap().unwrap();

        assert_eq!(echoed, b"after-ping");
        assert!(conn.last_pong() > before);
    }

    #[tokio::test]
    async fn test_last_pong_never_precedes_ping_on_fast_link() {
        let (url, _) = start_echo_server().await;
        let conn = WebSocketConnection::connect(&url, "t").await.unwrap();

        for round in 0..100 {
            let sent_at = std::time::Instant::now();
            conn.ping().await.unwrap();
            conn.send(b"after-ping").await.unwrap();
            conn.recv().await.unwrap().unwrap();
            assert!(
                conn.last_pong() >= sent_at,
                "pong of round {round} recorded before its ping"
            );
        }
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let conn = WebSocketConnection::connect(&format!("ws://{addr}"), "t")
            .await
            .unwrap();
        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on server close");
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_returns_connect_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WebSocketConnection::connect(&format!("ws://{addr}"), "t")
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, TransportError::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_token_with_newline() {
        let err = WebSocketConnection::connect("ws://127.0.0.1:1", "bad\ntoken")
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, TransportError::InvalidHeader(_)));
    }
}
