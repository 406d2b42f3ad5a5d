//! Agent settings: a JSON file plus environment overrides.
//!
//! ```json
//! {
//!   "server_url": "wss://gateway.example/agent",
//!   "agent_token": "...",
//!   "mafiles_dir": "maFiles",
//!   "accounts_path": "config/accounts.json",
//!   "proxies_path": "config/proxies.json"
//! }
//! ```
//!
//! Relative paths are resolved against the config file's directory.
//! `STEAMRELAY_SERVER_URL` and `STEAMRELAY_AGENT_TOKEN` win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use steamrelay::{ChannelConfig, RetryPolicy};
use steamrelay_market::ListingPaging;
use steamrelay_session::SessionCacheConfig;

use crate::AgentError;

pub const SERVER_URL_ENV: &str = "STEAMRELAY_SERVER_URL";
pub const AGENT_TOKEN_ENV: &str = "STEAMRELAY_AGENT_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Gateway WebSocket URL.
    #[serde(alias = "server_ip")]
    pub server_url: String,

    /// Bearer token the gateway knows this agent by.
    pub agent_token: String,

    pub mafiles_dir: PathBuf,
    pub accounts_path: PathBuf,
    pub proxies_path: PathBuf,

    /// Pause before redialing a lost gateway connection.
    pub reconnect_delay_secs: u64,

    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,

    /// Sessions validated more recently than this skip the liveness check.
    pub session_liveness_secs: u64,

    /// Pause between heavy listing requests, in milliseconds.
    pub listing_pacing_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            agent_token: String::new(),
            mafiles_dir: PathBuf::from("maFiles"),
            accounts_path: PathBuf::from("config/accounts.json"),
            proxies_path: PathBuf::from("config/proxies.json"),
            reconnect_delay_secs: 5,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
            session_liveness_secs: 30,
            listing_pacing_ms: 5400,
        }
    }
}

impl AgentConfig {
    /// Reads `path` and resolves relative paths against its directory.
    pub async fn load(path: &Path) -> Result<Self, AgentError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| AgentError::io(path, e))?;
        let mut config: Self = serde_json::from_slice(&raw).map_err(|e| AgentError::json(path, e))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for p in [
            &mut self.mafiles_dir,
            &mut self.accounts_path,
            &mut self.proxies_path,
        ] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }

    /// Applies the environment overrides; `lookup` is `std::env::var`
    /// in the binary.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(SERVER_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(token) = lookup(AGENT_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.agent_token = token;
        }
        self
    }

    /// Rejects an empty server URL or token; clamps zero intervals.
    pub fn validated(mut self) -> Result<Self, AgentError> {
        self.server_url = self.server_url.trim().to_owned();
        self.agent_token = self.agent_token.trim().to_owned();
        if self.server_url.is_empty() {
            return Err(AgentError::MissingSetting("server_url"));
        }
        if self.agent_token.is_empty() {
            return Err(AgentError::MissingSetting("agent_token"));
        }
        self.reconnect_delay_secs = self.reconnect_delay_secs.max(1);
        self.ping_interval_secs = self.ping_interval_secs.max(1);
        self.pong_timeout_secs = self.pong_timeout_secs.max(1);
        Ok(self)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
            ..ChannelConfig::default()
        }
    }

    pub fn session_cache(&self) -> SessionCacheConfig {
        SessionCacheConfig {
            liveness_interval: Duration::from_secs(self.session_liveness_secs),
        }
    }

    pub fn paging(&self) -> ListingPaging {
        ListingPaging {
            pacing: Duration::from_millis(self.listing_pacing_ms),
            ..ListingPaging::default()
        }
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}
