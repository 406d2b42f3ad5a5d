//! Bridge settings and the policy applied when an agent stops answering.

use std::time::Duration;

use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// BridgeConfig
// ---------------------------------------------------------------------------

/// Relay naming and wait limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Pub/sub topic the gateway listens on.
    pub topic: String,

    /// Responses are pushed to `<response_prefix><request_id>`.
    pub response_prefix: String,

    /// Wait used by [`RemoteSteamClient`](crate::RemoteSteamClient)
    /// when the caller doesn't pass one.
    pub command_timeout: Duration,

    /// Upper bound on blocking waits in flight at once; each one holds
    /// a pooled relay connection.
    pub max_concurrent_waits: usize,

    /// Longest single wait for a response; longer timeouts are cut to it.
    /// Pooled connections give up reading shortly after this.
    pub max_wait: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            topic: "to_agent_gateway".to_owned(),
            response_prefix: "response:".to_owned(),
            command_timeout: Duration::from_secs(60),
            max_concurrent_waits: 10,
            max_wait: Duration::from_secs(300),
        }
    }
}

impl BridgeConfig {
    /// Clamps `max_concurrent_waits` to at least 1 and `max_wait` to at
    /// least `command_timeout`.
    pub fn validated(mut self) -> Self {
        self.max_concurrent_waits = self.max_concurrent_waits.max(1);
        self.max_wait = self.max_wait.max(self.command_timeout);
        self
    }

    /// The list key a response to `request_id` lands on.
    pub fn response_key(&self, request_id: &str) -> String {
        format!("{}{request_id}", self.response_prefix)
    }
}

// ---------------------------------------------------------------------------
// UnreachablePolicy
// ---------------------------------------------------------------------------

/// Reported to the supervisor under [`UnreachablePolicy::Quarantine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unreachable {
    pub target_token: String,
    pub account_login: String,
    pub cmd: String,
    pub reason: String,
}

/// What the bridge does once an agent is found unreachable.
///
/// The caller must not keep running commands against an agent that
/// stopped answering. Either the whole process goes down, or the agent
/// token is poisoned so every later call fails at once and a supervisor
/// is told about it.
#[derive(Debug, Clone, Default)]
pub enum UnreachablePolicy {
    /// Log and exit the process with status 1.
    #[default]
    ExitProcess,

    /// Poison the token and send an [`Unreachable`] report.
    Quarantine(mpsc::UnboundedSender<Unreachable>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_gateway_names() {
        let config = BridgeConfig::default();
        assert_eq!(config.topic, "to_agent_gateway");
        assert_eq!(config.response_key("abc"), "response:abc");
        assert_eq!(config.max_concurrent_waits, 10);
    }

    #[test]
    fn test_validated_clamps_zero_waits() {
        let config = BridgeConfig {
            max_concurrent_waits: 0,
            ..BridgeConfig::default()
        }
        .validated();
        assert_eq!(config.max_concurrent_waits, 1);
    }

    #[test]
    fn test_validated_keeps_default_timeout_within_max_wait() {
        let config = BridgeConfig {
            command_timeout: Duration::from_secs(600),
            max_wait: Duration::from_secs(5),
            ..BridgeConfig::default()
        }
        .validated();
        assert_eq!(config.max_wait, Duration::from_secs(600));
    }

    #[test]
    fn test_default_policy_exits() {
        assert!(matches!(
            UnreachablePolicy::default(),
            UnreachablePolicy::ExitProcess
        ));
    }
}
