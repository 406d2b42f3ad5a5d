//! The agent's side of the gateway connection.
//!
//! The agent dials out, so there is no accept loop here: one
//! [`CommandChannel::serve`] call drives one connection until it ends.
//!
//! ```text
//!  gateway ──frames──► decode ──spawn──► CommandDispatcher::execute
//!     ▲                                           │
//!     └──── send ◄── pending responses (ordered) ◄┘
//! ```
//!
//! Each command runs on its own task so a slow login never stalls
//! another. Responses are queued in receipt order by default, and every
//! decodable request gets exactly one.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesOrdered, FuturesUnordered};
use steamrelay_protocol::{
    AgentMessage, Codec, CommandEnvelope, ErrorCode, JsonCodec, RequestId, ResponseEnvelope,
};
use steamrelay_session::{CredentialStore, SessionBackend, SteamSession};
use steamrelay_transport::{Connection, ConnectionStatus, TransportError};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{ChannelConfig, ChannelError, CommandDispatcher, ResponseOrder};

type PendingResponse = BoxFuture<'static, ResponseEnvelope>;

/// Responses not yet written, in the configured order.
enum PendingResponses {
    Receipt(FuturesOrdered<PendingResponse>),
    Completion(FuturesUnordered<PendingResponse>),
}

impl PendingResponses {
    fn new(order: ResponseOrder) -> Self {
        match order {
            ResponseOrder::Receipt => Self::Receipt(FuturesOrdered::new()),
            ResponseOrder::Completion => Self::Completion(FuturesUnordered::new()),
        }
    }

    fn push(&mut self, response: PendingResponse) {
        match self {
            Self::Receipt(queue) => queue.push_back(response),
            Self::Completion(set) => set.push(response),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Receipt(queue) => queue.len(),
            Self::Completion(set) => set.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn next(&mut self) -> Option<ResponseEnvelope> {
        match self {
            Self::Receipt(queue) => queue.next().await,
            Self::Completion(set) => set.next().await,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandChannel
// ---------------------------------------------------------------------------

/// Serves commands from the gateway over one connection at a time.
///
/// Connectivity changes are published on a watch channel
/// ([`status`](Self::status)); reconnecting is up to whoever watches it.
pub struct CommandChannel<B: SessionBackend, S, C: Codec = JsonCodec> {
    dispatcher: Arc<CommandDispatcher<B, S>>,
    logins: Vec<String>,
    config: ChannelConfig,
    codec: C,
    status: watch::Sender<ConnectionStatus>,
}

impl<B, S> CommandChannel<B, S, JsonCodec>
where
    B: SessionBackend<Session = SteamSession>,
    S: CredentialStore,
{
    /// A JSON channel announcing `logins` in its manifest.
    pub fn new(
        dispatcher: Arc<CommandDispatcher<B, S>>,
        logins: Vec<String>,
        config: ChannelConfig,
    ) -> Self {
        Self::with_codec(dispatcher, logins, config, JsonCodec)
    }
}

impl<B, S, C> CommandChannel<B, S, C>
where
    B: SessionBackend<Session = SteamSession>,
    S: CredentialStore,
    C: Codec,
{
    pub fn with_codec(
        dispatcher: Arc<CommandDispatcher<B, S>>,
        logins: Vec<String>,
        config: ChannelConfig,
        codec: C,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected {
            reason: "not started".to_owned(),
        });
        Self {
            dispatcher,
            logins,
            config: config.validated(),
            codec,
            status,
        }
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher<B, S>> {
        &self.dispatcher
    }

    pub fn logins(&self) -> &[String] {
        &self.logins
    }

    /// Subscribes to connectivity changes.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Publishes `Connecting`; call before dialing.
    pub fn set_connecting(&self) {
        self.status.send_replace(ConnectionStatus::Connecting);
    }

    /// Sends the manifest, then serves commands until the connection
    /// ends or `shutdown` fires.
    ///
    /// Status goes to `Connected` once the manifest is out and to
    /// `Disconnected` on exit.
    /// Responses still in flight when the connection ends are lost.
    ///
    /// # Errors
    /// Why the connection ended: closed, pong timeout, or a transport
    /// failure. Returns `Ok(())` only for `shutdown`.
    pub async fn serve<T>(&self, conn: &T, shutdown: &CancellationToken) -> Result<(), ChannelError>
    where
        T: Connection<Error = TransportError>,
    {
        let conn_id = conn.id();
        let mut pending = PendingResponses::new(self.config.response_order);
        let outcome = self.run(conn, shutdown, &mut pending).await;
        if !pending.is_empty() {
            tracing::warn!(%conn_id, dropped = pending.len(), "responses lost with the connection");
        }

        let reason = match &outcome {
            Ok(()) => "shutdown".to_owned(),
            Err(e) => e.to_string(),
        };
        tracing::info!(%conn_id, %reason, "channel disconnected");
        self.status
            .send_replace(ConnectionStatus::Disconnected { reason });
        outcome
    }

    async fn run<T>(
        &self,
        conn: &T,
        shutdown: &CancellationToken,
        pending: &mut PendingResponses,
    ) -> Result<(), ChannelError>
    where
        T: Connection<Error = TransportError>,
    {
        let manifest = AgentMessage::Manifest {
            logins: self.logins.clone(),
        };
        conn.send(&self.codec.encode(&manifest)?).await?;
        self.status.send_replace(ConnectionStatus::Connected);
        tracing::info!(conn_id = %conn.id(), logins = self.logins.len(), "channel connected, manifest sent");

        let interval = self.config.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + interval, interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // (when the ping went out, when its pong is due)
        let mut awaiting_pong: Option<(std::time::Instant, Instant)> = None;

        loop {
            let pong_due = awaiting_pong.map(|(_, due)| due);
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    if let Err(e) = conn.close().await {
                        tracing::debug!(error = %e, "close on shutdown failed");
                    }
                    return Ok(());
                }

                Some(response) = pending.next(), if !pending.is_empty() => {
                    conn.send(&self.codec.encode(&response)?).await?;
                    tracing::debug!(request_id = %response.request_id, "response sent");
                }

                frame = conn.recv() => match frame? {
                    Some(data) => self.accept(&data, pending),
                    None => return Err(ChannelError::Closed),
                },

                _ = tokio::time::sleep_until(pong_due.unwrap_or_else(Instant::now)),
                    if pong_due.is_some() =>
                {
                    if let Some((sent_at, _)) = awaiting_pong.take() {
                        if conn.last_pong() < sent_at {
                            return Err(ChannelError::PongTimeout(self.config.pong_timeout));
                        }
                    }
                }

                _ = ping.tick() => {
                    if awaiting_pong.is_none() {
                        let sent_at = std::time::Instant::now();
                        conn.ping().await?;
                        awaiting_pong = Some((sent_at, Instant::now() + self.config.pong_timeout));
                    }
                }
            }
        }
    }

    /// Queues the response to one inbound frame.
    fn accept(&self, data: &[u8], pending: &mut PendingResponses) {
        let envelope: CommandEnvelope = match self.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                match RequestId::sniff(data) {
                    Some(request_id) => {
                        tracing::debug!(%request_id, error = %e, "malformed command");
                        let response = ResponseEnvelope::error(
                            request_id,
                            ErrorCode::InvalidArgument,
                            e.to_string(),
                        );
                        pending.push(Box::pin(std::future::ready(response)));
                    }
                    None => tracing::warn!(error = %e, "dropping frame without request_id"),
                }
                return;
            }
        };

        tracing::debug!(
            request_id = %envelope.request_id,
            cmd = %envelope.cmd,
            login = %envelope.account_login,
            "command received"
        );
        let request_id = envelope.request_id.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let task = tokio::spawn(async move { dispatcher.execute(envelope).await });
        pending.push(Box::pin(async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!(%request_id, error = %e, "command task failed");
                ResponseEnvelope::error(request_id, ErrorCode::Internal, "command task failed")
            })
        }));
    }
}
