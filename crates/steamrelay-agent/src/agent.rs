//! Startup wiring and the reconnect loop.

use std::sync::Arc;

use steamrelay::{ChannelError, CommandChannel, CommandDispatcher};
use steamrelay_session::{SessionCache, SteamBackend, SteamUrls};
use steamrelay_transport::{ConnectionStatus, WebSocketConnection};
use tokio_util::sync::CancellationToken;

use crate::{AgentConfig, AgentError, JsonCredentialStore, JsonProxyResolver, MaFileScanner};

pub type AgentBackend = SteamBackend<JsonProxyResolver>;
pub type AgentChannel = CommandChannel<AgentBackend, JsonCredentialStore>;

/// One agent process: the accounts found at startup, served over a single
/// gateway connection that is redialed whenever it drops.
pub struct Agent {
    config: AgentConfig,
    channel: AgentChannel,
}

impl Agent {
    /// Validates settings, scans maFiles and wires the command stack.
    ///
    /// # Errors
    /// [`AgentError::MissingSetting`] for an empty URL or token,
    /// [`AgentError::NoAccounts`] when the maFiles folder has no usable
    /// file, and file errors from the proxies file.
    pub async fn build(config: AgentConfig) -> Result<Self, AgentError> {
        Self::build_with_urls(config, SteamUrls::default()).await
    }

    /// [`build`](Self::build) against non-default Steam hosts.
    pub async fn build_with_urls(config: AgentConfig, urls: SteamUrls) -> Result<Self, AgentError> {
        let config = config.validated()?;

        let logins = MaFileScanner::new(&config.mafiles_dir).logins().await?;
        if logins.is_empty() {
            return Err(AgentError::NoAccounts(config.mafiles_dir.clone()));
        }
        tracing::info!(count = logins.len(), "accounts found");

        let proxies = JsonProxyResolver::load(&config.proxies_path).await?;
        let store = Arc::new(JsonCredentialStore::new(&config.accounts_path));
        let sessions = SessionCache::new(
            SteamBackend::new(urls, proxies),
            store,
            config.session_cache(),
        );
        let dispatcher = CommandDispatcher::new(sessions, config.paging(), config.retry());
        let channel = CommandChannel::new(Arc::new(dispatcher), logins, config.channel());

        Ok(Self { config, channel })
    }

    pub fn logins(&self) -> &[String] {
        self.channel.logins()
    }

    pub fn channel(&self) -> &AgentChannel {
        &self.channel
    }

    /// Dials the gateway and serves until `shutdown` fires.
    ///
    /// A failed dial or a dropped connection is retried after
    /// `reconnect_delay`. With `once` the first failure ends the run and
    /// is returned instead. Live sessions are logged out before returning.
    pub async fn run(&self, shutdown: &CancellationToken, once: bool) -> Result<(), AgentError> {
        let outcome = self.serve_until_stopped(shutdown, once).await;
        self.channel.dispatcher().shutdown().await;
        tracing::info!("agent stopped");
        outcome
    }

    async fn serve_until_stopped(
        &self,
        shutdown: &CancellationToken,
        once: bool,
    ) -> Result<(), AgentError> {
        let mut attempt: u64 = 0;
        while !shutdown.is_cancelled() {
            attempt += 1;
            let failure = match self.session(shutdown, attempt).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if once {
                return Err(failure);
            }
            tracing::warn!(
                error = %failure,
                retry_in = ?self.config.reconnect_delay(),
                "gateway connection lost"
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay()) => {}
            }
        }
        Ok(())
    }

    /// One dial plus one serve. `Ok` means shutdown was requested.
    async fn session(&self, shutdown: &CancellationToken, attempt: u64) -> Result<(), AgentError> {
        self.channel.set_connecting();
        tracing::info!(url = %self.config.server_url, attempt, "connecting to gateway");

        let dial = WebSocketConnection::connect(&self.config.server_url, &self.config.agent_token);
        let conn = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            conn = dial => conn?,
        };
        tracing::info!(logins = self.logins().len(), "gateway connected");

        match self.channel.serve(&conn, shutdown).await {
            Ok(()) => Ok(()),
            Err(ChannelError::Closed) if shutdown.is_cancelled() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Current gateway connectivity.
    pub fn status(&self) -> ConnectionStatus {
        let status = self.channel.status();
        let current = status.borrow().clone();
        current
    }
}
